//! Lifecycle events and their causal chain
//!
//! Every event carries a fresh [`EventId`] and the ids of the events that
//! led to it, most recent first. An event built in response to a trigger `T`
//! always starts its chain with `T.id` followed by `T`'s own chain, so a
//! consumer can rebuild a saga from any of its events.

use crate::image::DockerImage;
use crate::stack::StackIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Free-form event metadata
pub type Metadata = BTreeMap<String, String>;

/// Well-known metadata keys
pub mod keys {
    /// Human-readable failure detail on `*Failed` events
    pub const ERROR: &str = "error";
    /// `"true"` when re-sending the request may succeed as-is
    pub const RETRYABLE: &str = "retryable";
    /// Container registry user for image pushes
    pub const CREDENTIAL_NAME: &str = "credential_name";
    /// Container registry login server
    pub const DOCKER_REGISTRY_URL: &str = "docker_registry_url";
}

/// Unique event identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Type of a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    InfrastructureUpdateRequested,
    InfrastructureUpdated,
    InfrastructureUpdateFailed,
    InfrastructureRemovalRequested,
    InfrastructureRemoved,
    InfrastructureRemovalFailed,
    DockerResourcesUpdateRequested,
    DockerResourcesUpdated,
    DockerResourcesUpdateFailed,
    DockerResourcesRemovalRequested,
    DockerResourcesRemoved,
    DockerResourcesRemovalFailed,
    DockerImageRequested,
    DockerImageDetailsRequested,
}

impl EventKind {
    pub const ALL: [EventKind; 14] = [
        EventKind::InfrastructureUpdateRequested,
        EventKind::InfrastructureUpdated,
        EventKind::InfrastructureUpdateFailed,
        EventKind::InfrastructureRemovalRequested,
        EventKind::InfrastructureRemoved,
        EventKind::InfrastructureRemovalFailed,
        EventKind::DockerResourcesUpdateRequested,
        EventKind::DockerResourcesUpdated,
        EventKind::DockerResourcesUpdateFailed,
        EventKind::DockerResourcesRemovalRequested,
        EventKind::DockerResourcesRemoved,
        EventKind::DockerResourcesRemovalFailed,
        EventKind::DockerImageRequested,
        EventKind::DockerImageDetailsRequested,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::InfrastructureUpdateRequested => "InfrastructureUpdateRequested",
            EventKind::InfrastructureUpdated => "InfrastructureUpdated",
            EventKind::InfrastructureUpdateFailed => "InfrastructureUpdateFailed",
            EventKind::InfrastructureRemovalRequested => "InfrastructureRemovalRequested",
            EventKind::InfrastructureRemoved => "InfrastructureRemoved",
            EventKind::InfrastructureRemovalFailed => "InfrastructureRemovalFailed",
            EventKind::DockerResourcesUpdateRequested => "DockerResourcesUpdateRequested",
            EventKind::DockerResourcesUpdated => "DockerResourcesUpdated",
            EventKind::DockerResourcesUpdateFailed => "DockerResourcesUpdateFailed",
            EventKind::DockerResourcesRemovalRequested => "DockerResourcesRemovalRequested",
            EventKind::DockerResourcesRemoved => "DockerResourcesRemoved",
            EventKind::DockerResourcesRemovalFailed => "DockerResourcesRemovalFailed",
            EventKind::DockerImageRequested => "DockerImageRequested",
            EventKind::DockerImageDetailsRequested => "DockerImageDetailsRequested",
        }
    }

    /// Whether this kind reports a failed operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventKind::InfrastructureUpdateFailed
                | EventKind::InfrastructureRemovalFailed
                | EventKind::DockerResourcesUpdateFailed
                | EventKind::DockerResourcesRemovalFailed
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

/// An immutable lifecycle event
///
/// The `with_*` builders consume the value, so an event can only be shaped
/// before it is handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    kind: EventKind,

    #[serde(default)]
    id: EventId,

    #[serde(default)]
    previous_event_ids: Vec<EventId>,

    #[serde(flatten)]
    stack: StackIdentity,

    /// `image_name`/`image_version`/`image_url` at the top level
    #[serde(flatten)]
    image: Option<DockerImage>,

    #[serde(default)]
    metadata: Metadata,

    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an event that starts a new saga
    pub fn new(kind: EventKind, stack: StackIdentity) -> Self {
        Self {
            kind,
            id: EventId::new(),
            previous_event_ids: Vec::new(),
            stack,
            image: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    /// Creates an event triggered by `trigger`
    ///
    /// Stack identity, image and metadata are carried over; the chain becomes
    /// `[trigger.id] ++ trigger.previous_event_ids`.
    pub fn caused_by(trigger: &Event, kind: EventKind) -> Self {
        Self {
            kind,
            id: EventId::new(),
            previous_event_ids: trigger.causal_chain(),
            stack: trigger.stack.clone(),
            image: trigger.image.clone(),
            metadata: trigger.metadata.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn infrastructure_update_requested(stack: StackIdentity) -> Self {
        Self::new(EventKind::InfrastructureUpdateRequested, stack)
    }

    pub fn infrastructure_removal_requested(stack: StackIdentity) -> Self {
        Self::new(EventKind::InfrastructureRemovalRequested, stack)
    }

    pub fn docker_resources_update_requested(stack: StackIdentity, image: DockerImage) -> Self {
        Self::new(EventKind::DockerResourcesUpdateRequested, stack).with_image(image)
    }

    pub fn docker_resources_removal_requested(stack: StackIdentity) -> Self {
        Self::new(EventKind::DockerResourcesRemovalRequested, stack)
    }

    pub fn docker_image_details_requested(stack: StackIdentity) -> Self {
        Self::new(EventKind::DockerImageDetailsRequested, stack)
    }

    pub fn with_image(mut self, image: DockerImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn without_metadata(mut self, key: &str) -> Self {
        self.metadata.remove(key);
        self
    }

    pub fn with_metadata_map(mut self, metadata: &Metadata) -> Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn previous_event_ids(&self) -> &[EventId] {
        &self.previous_event_ids
    }

    pub fn stack(&self) -> &StackIdentity {
        &self.stack
    }

    pub fn stack_name(&self) -> &str {
        &self.stack.stack_name
    }

    pub fn project_name(&self) -> &str {
        &self.stack.project_name
    }

    pub fn location(&self) -> &str {
        &self.stack.location
    }

    pub fn image(&self) -> Option<&DockerImage> {
        self.image.as_ref()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// This event's id followed by its whole history
    pub fn causal_chain(&self) -> Vec<EventId> {
        let mut chain = Vec::with_capacity(self.previous_event_ids.len() + 1);
        chain.push(self.id);
        chain.extend_from_slice(&self.previous_event_ids);
        chain
    }

    /// Serializes the event as a single JSON line
    pub fn to_json_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses one JSON line from the event bus
    ///
    /// Returns `Ok(None)` when the `type` is not one this crate knows about;
    /// such events belong to other consumers.
    pub fn from_json_line(line: &str) -> crate::Result<Option<Event>> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        let known = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .map(|t| t.parse::<EventKind>().is_ok())
            .unwrap_or(false);
        if !known {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }
}
