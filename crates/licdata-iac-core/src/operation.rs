//! Units of work selected for one inbound request

use crate::event::{keys, Event};
use crate::image::ImageSettings;
use crate::orchestrator::{DockerResourceOrchestrator, InfrastructureOrchestrator};
use async_trait::async_trait;
use std::sync::Arc;

/// One request bound to the code that handles it
#[async_trait]
pub trait StackOperation: Send + Sync {
    fn name(&self) -> &'static str;

    fn request(&self) -> &Event;

    /// Handles the request and returns the ordered result events
    async fn perform(&self) -> Vec<Event>;
}

pub struct UpdateInfrastructure {
    request: Event,
    orchestrator: Arc<InfrastructureOrchestrator>,
}

impl UpdateInfrastructure {
    pub fn new(request: Event, orchestrator: Arc<InfrastructureOrchestrator>) -> Self {
        Self {
            request,
            orchestrator,
        }
    }
}

#[async_trait]
impl StackOperation for UpdateInfrastructure {
    fn name(&self) -> &'static str {
        "update-infrastructure"
    }

    fn request(&self) -> &Event {
        &self.request
    }

    async fn perform(&self) -> Vec<Event> {
        self.orchestrator.update(&self.request).await
    }
}

pub struct RemoveInfrastructure {
    request: Event,
    orchestrator: Arc<InfrastructureOrchestrator>,
}

impl RemoveInfrastructure {
    pub fn new(request: Event, orchestrator: Arc<InfrastructureOrchestrator>) -> Self {
        Self {
            request,
            orchestrator,
        }
    }
}

#[async_trait]
impl StackOperation for RemoveInfrastructure {
    fn name(&self) -> &'static str {
        "remove-infrastructure"
    }

    fn request(&self) -> &Event {
        &self.request
    }

    async fn perform(&self) -> Vec<Event> {
        self.orchestrator.remove(&self.request).await
    }
}

pub struct UpdateDockerResources {
    request: Event,
    orchestrator: Arc<DockerResourceOrchestrator>,
}

impl UpdateDockerResources {
    pub fn new(request: Event, orchestrator: Arc<DockerResourceOrchestrator>) -> Self {
        Self {
            request,
            orchestrator,
        }
    }
}

#[async_trait]
impl StackOperation for UpdateDockerResources {
    fn name(&self) -> &'static str {
        "update-docker-resources"
    }

    fn request(&self) -> &Event {
        &self.request
    }

    async fn perform(&self) -> Vec<Event> {
        self.orchestrator.update(&self.request).await
    }
}

pub struct RemoveDockerResources {
    request: Event,
    orchestrator: Arc<DockerResourceOrchestrator>,
}

impl RemoveDockerResources {
    pub fn new(request: Event, orchestrator: Arc<DockerResourceOrchestrator>) -> Self {
        Self {
            request,
            orchestrator,
        }
    }
}

#[async_trait]
impl StackOperation for RemoveDockerResources {
    fn name(&self) -> &'static str {
        "remove-docker-resources"
    }

    fn request(&self) -> &Event {
        &self.request
    }

    async fn perform(&self) -> Vec<Event> {
        self.orchestrator.remove(&self.request).await
    }
}

/// Asks the image pipeline for the configured image without touching the stack
///
/// Registry credentials are taken from the request metadata, since no
/// synchronization happens here.
pub struct RequestDockerImageDetails {
    request: Event,
    image: ImageSettings,
}

impl RequestDockerImageDetails {
    pub fn new(request: Event, image: ImageSettings) -> Self {
        Self { request, image }
    }
}

#[async_trait]
impl StackOperation for RequestDockerImageDetails {
    fn name(&self) -> &'static str {
        "request-docker-image-details"
    }

    fn request(&self) -> &Event {
        &self.request
    }

    async fn perform(&self) -> Vec<Event> {
        let event = self.image.request(
            &self.request,
            self.request.metadata_value(keys::CREDENTIAL_NAME),
            self.request.metadata_value(keys::DOCKER_REGISTRY_URL),
        );
        tracing::info!("Requesting image {} for {}", self.image.image(), self.request.stack());
        vec![event]
    }
}
