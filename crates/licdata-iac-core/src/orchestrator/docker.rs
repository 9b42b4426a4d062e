use super::{failure_event, InfrastructureOrchestrator};
use crate::declaration::Declaration;
use crate::error::{CommandError, IacError};
use crate::event::{Event, EventKind};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Drives Docker-resource update and removal requests
///
/// Docker-dependent resources sit on top of the base infrastructure, so both
/// are declared inside the same synchronization through the inner
/// [`InfrastructureOrchestrator`]. Splitting them into two applies would
/// expose an intermediate state to other readers of the stack.
pub struct DockerResourceOrchestrator {
    infrastructure: Arc<InfrastructureOrchestrator>,
}

impl DockerResourceOrchestrator {
    pub fn new(infrastructure: Arc<InfrastructureOrchestrator>) -> Self {
        Self { infrastructure }
    }

    pub fn infrastructure(&self) -> &InfrastructureOrchestrator {
        &self.infrastructure
    }

    /// `DockerResourcesUpdateRequested` → `[DockerResourcesUpdated]` or
    /// `[DockerResourcesUpdateFailed]`
    pub async fn update(&self, request: &Event) -> Vec<Event> {
        let Some(image) = request.image().cloned() else {
            let error = CommandError::program(
                IacError::MalformedRequest {
                    event: request.id().to_string(),
                    field: "image",
                }
                .to_string(),
            );
            error!("Rejecting {}: {}", request.kind(), error);
            return vec![failure_event(
                request,
                EventKind::DockerResourcesUpdateFailed,
                &error,
            )];
        };

        let embedded = infrastructure_request(request);
        let stack = self.infrastructure.create_stack(embedded.stack());
        let program = |decl: &mut Declaration| -> crate::Result<()> {
            let base = stack.declare_infrastructure(decl)?;
            stack.declare_docker_resources(decl, &base, &image)?;
            Ok(())
        };

        info!("Deploying {} to {}", image, stack.identity());
        match self
            .infrastructure
            .synchronize(&embedded, stack.as_ref(), &program)
            .await
        {
            Ok(_) => vec![Event::caused_by(request, EventKind::DockerResourcesUpdated)],
            Err(e) => vec![failure_event(
                request,
                EventKind::DockerResourcesUpdateFailed,
                &e,
            )],
        }
    }

    /// `DockerResourcesRemovalRequested` → `[DockerResourcesRemoved]` or
    /// `[DockerResourcesRemovalFailed]`
    ///
    /// Converges the stack to its base infrastructure, which makes the backend
    /// delete every Docker-dependent resource. Images in the registry are
    /// left alone.
    pub async fn remove(&self, request: &Event) -> Vec<Event> {
        let embedded = infrastructure_request(request);
        let stack = self.infrastructure.create_stack(embedded.stack());
        let program = |decl: &mut Declaration| -> crate::Result<()> {
            stack.declare_infrastructure(decl).map(|_| ())
        };

        match self
            .infrastructure
            .synchronize(&embedded, stack.as_ref(), &program)
            .await
        {
            Ok(outcome) => {
                info!(
                    "Removed {} Docker-dependent resources from {}",
                    outcome.summary.delete,
                    stack.identity()
                );
                vec![Event::caused_by(request, EventKind::DockerResourcesRemoved)]
            }
            Err(e) => vec![failure_event(
                request,
                EventKind::DockerResourcesRemovalFailed,
                &e,
            )],
        }
    }
}

/// The base-infrastructure request embedded in a Docker-resource request
fn infrastructure_request(request: &Event) -> Event {
    let embedded = Event::caused_by(request, EventKind::InfrastructureUpdateRequested);
    debug!(
        "Derived {} {} from {} {}",
        embedded.kind(),
        embedded.id(),
        request.kind(),
        request.id()
    );
    embedded
}
