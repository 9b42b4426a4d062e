//! Request → synchronize → outcome event orchestration
//!
//! Orchestrators accept exactly one request event and return the ordered
//! result events. Every result is built with [`Event::caused_by`] from the
//! request, and backend failures are converted into `*Failed` events; no
//! error crosses this boundary.

mod docker;
mod infrastructure;

pub use docker::DockerResourceOrchestrator;
pub use infrastructure::InfrastructureOrchestrator;

use crate::error::CommandError;
use crate::event::{keys, Event, EventKind};

/// Lifecycle of one synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Request received
    Requested,
    /// Waiting on the backend
    Synchronizing,
    /// Backend reported success
    Updated,
    /// Backend reported a command failure
    Failed,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Requested => write!(f, "requested"),
            SyncState::Synchronizing => write!(f, "synchronizing"),
            SyncState::Updated => write!(f, "updated"),
            SyncState::Failed => write!(f, "failed"),
        }
    }
}

/// Builds the `*Failed` event for `request`, carrying the error detail
pub(crate) fn failure_event(request: &Event, kind: EventKind, error: &CommandError) -> Event {
    Event::caused_by(request, kind)
        .with_metadata(keys::ERROR, error.to_string())
        .with_metadata(keys::RETRYABLE, error.is_retryable().to_string())
}
