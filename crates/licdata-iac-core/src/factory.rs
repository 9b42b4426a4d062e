//! Request → operation dispatch

use crate::event::{Event, EventKind};
use crate::image::ImageSettings;
use crate::operation::{
    RemoveDockerResources, RemoveInfrastructure, RequestDockerImageDetails, StackOperation,
    UpdateDockerResources, UpdateInfrastructure,
};
use crate::orchestrator::{DockerResourceOrchestrator, InfrastructureOrchestrator};
use crate::runner::StackRunner;
use crate::stack::StackFactory;
use std::sync::Arc;

/// Maps inbound request events to [`StackOperation`]s
///
/// Events that are not requests (results, failures, image requests) have no
/// operation and yield `None`.
pub struct StackOperationFactory {
    infrastructure: Arc<InfrastructureOrchestrator>,
    docker: Arc<DockerResourceOrchestrator>,
}

impl StackOperationFactory {
    pub fn new(
        runner: Arc<dyn StackRunner>,
        stacks: Arc<dyn StackFactory>,
        image: ImageSettings,
    ) -> Self {
        let infrastructure = Arc::new(InfrastructureOrchestrator::new(runner, stacks, image));
        let docker = Arc::new(DockerResourceOrchestrator::new(infrastructure.clone()));
        Self {
            infrastructure,
            docker,
        }
    }

    pub fn infrastructure(&self) -> &InfrastructureOrchestrator {
        &self.infrastructure
    }

    pub fn docker(&self) -> &DockerResourceOrchestrator {
        &self.docker
    }

    pub fn new_operation(&self, event: &Event) -> Option<Box<dyn StackOperation>> {
        let request = event.clone();
        let operation: Box<dyn StackOperation> = match event.kind() {
            EventKind::DockerImageDetailsRequested => Box::new(RequestDockerImageDetails::new(
                request,
                self.infrastructure.image_settings().clone(),
            )),
            EventKind::DockerResourcesUpdateRequested => {
                Box::new(UpdateDockerResources::new(request, self.docker.clone()))
            }
            EventKind::InfrastructureUpdateRequested => {
                Box::new(UpdateInfrastructure::new(request, self.infrastructure.clone()))
            }
            EventKind::InfrastructureRemovalRequested => {
                Box::new(RemoveInfrastructure::new(request, self.infrastructure.clone()))
            }
            EventKind::DockerResourcesRemovalRequested => {
                Box::new(RemoveDockerResources::new(request, self.docker.clone()))
            }
            other => {
                tracing::debug!("No operation for {} {}", other, event.id());
                return None;
            }
        };
        Some(operation)
    }

    /// Runs the operation for `event`, if there is one
    pub async fn dispatch(&self, event: &Event) -> Option<Vec<Event>> {
        let operation = self.new_operation(event)?;
        tracing::debug!("Dispatching {} to {}", event.id(), operation.name());
        Some(operation.perform().await)
    }
}
