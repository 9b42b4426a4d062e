use super::{failure_event, SyncState};
use crate::declaration::Declaration;
use crate::error::CommandError;
use crate::event::{Event, EventKind};
use crate::image::ImageSettings;
use crate::runner::{DeclareFn, Outcome, StackRunner};
use crate::stack::{Stack, StackFactory, StackIdentity};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Drives infrastructure update and removal requests
///
/// A successful update also asks the image pipeline for the Docker image the
/// stack will run; a failed one stops the saga.
pub struct InfrastructureOrchestrator {
    runner: Arc<dyn StackRunner>,
    stacks: Arc<dyn StackFactory>,
    image: ImageSettings,
}

impl InfrastructureOrchestrator {
    pub fn new(
        runner: Arc<dyn StackRunner>,
        stacks: Arc<dyn StackFactory>,
        image: ImageSettings,
    ) -> Self {
        Self {
            runner,
            stacks,
            image,
        }
    }

    pub fn image_settings(&self) -> &ImageSettings {
        &self.image
    }

    pub fn runner(&self) -> &dyn StackRunner {
        self.runner.as_ref()
    }

    pub fn create_stack(&self, identity: &StackIdentity) -> Box<dyn Stack> {
        self.stacks.create(identity)
    }

    /// `InfrastructureUpdateRequested` → `[InfrastructureUpdated, DockerImageRequested]`
    /// or `[InfrastructureUpdateFailed]`
    pub async fn update(&self, request: &Event) -> Vec<Event> {
        let stack = self.create_stack(request.stack());
        let program = |decl: &mut Declaration| -> crate::Result<()> {
            stack.declare_infrastructure(decl).map(|_| ())
        };

        match self.synchronize(request, stack.as_ref(), &program).await {
            Ok(outcome) => {
                let credentials = stack.retrieve_container_registry_credentials(&outcome.outputs);
                if !credentials.is_complete() {
                    debug!(
                        "Registry credentials of {} not resolved, requesting image without them",
                        stack.identity()
                    );
                }
                let updated = Event::caused_by(request, EventKind::InfrastructureUpdated);
                let image_request = self.image.request(
                    request,
                    credentials.username.as_deref(),
                    credentials.registry_url.as_deref(),
                );
                debug!(
                    "Requesting image {} for {}",
                    self.image.image(),
                    stack.identity()
                );
                vec![updated, image_request]
            }
            Err(e) => vec![failure_event(
                request,
                EventKind::InfrastructureUpdateFailed,
                &e,
            )],
        }
    }

    /// `InfrastructureRemovalRequested` → `[InfrastructureRemoved]` or
    /// `[InfrastructureRemovalFailed]`
    pub async fn remove(&self, request: &Event) -> Vec<Event> {
        let stack = self.create_stack(request.stack());
        let identity = stack.identity();
        info!(
            state = %SyncState::Synchronizing,
            backend = self.runner.name(),
            "Destroying {}",
            identity
        );

        match self.runner.destroy(identity, &stack.config()).await {
            Ok(outcome) => {
                info!(state = %SyncState::Updated, "destroy summary for {}: {}", identity, outcome.summary);
                vec![Event::caused_by(request, EventKind::InfrastructureRemoved)]
            }
            Err(e) => {
                error!(
                    state = %SyncState::Failed,
                    retryable = e.is_retryable(),
                    "CommandError destroying {}: {}",
                    identity,
                    e
                );
                vec![failure_event(
                    request,
                    EventKind::InfrastructureRemovalFailed,
                    &e,
                )]
            }
        }
    }

    /// Runs one synchronization of `stack` on behalf of `request`
    pub(crate) async fn synchronize(
        &self,
        request: &Event,
        stack: &dyn Stack,
        program: &DeclareFn<'_>,
    ) -> Result<Outcome, CommandError> {
        let identity = stack.identity();
        debug!(
            event = %request.id(),
            kind = %request.kind(),
            state = %SyncState::Requested,
            "Request for {}",
            identity
        );
        info!(
            state = %SyncState::Synchronizing,
            backend = self.runner.name(),
            "Synchronizing {}",
            identity
        );

        let result = self
            .runner
            .synchronize(identity, program, &stack.config())
            .await;

        match &result {
            Ok(outcome) => info!(
                state = %SyncState::Updated,
                "update summary for {}: {}",
                identity,
                outcome.summary
            ),
            Err(e) => error!(
                state = %SyncState::Failed,
                retryable = e.is_retryable(),
                "CommandError on {}: {}",
                identity,
                e
            ),
        }
        result
    }
}
