//! Error types for stack declaration and provisioning

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while declaring or persisting stack state
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Resource declared twice: {0}")]
    DuplicateResource(String),

    #[error("Request is missing {field}: {event}")]
    MalformedRequest { event: String, field: &'static str },

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IacError>;

/// Which backend interaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandErrorKind {
    /// Applying the desired state failed
    Apply,
    /// Tearing the stack down failed
    Destroy,
    /// Another synchronization holds the stack lock
    LockContention,
    /// The declare function itself failed
    Program,
    /// The backend could not be reached or started
    Backend,
}

impl std::fmt::Display for CommandErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandErrorKind::Apply => write!(f, "apply"),
            CommandErrorKind::Destroy => write!(f, "destroy"),
            CommandErrorKind::LockContention => write!(f, "lock-contention"),
            CommandErrorKind::Program => write!(f, "program"),
            CommandErrorKind::Backend => write!(f, "backend"),
        }
    }
}

/// Failure reported by a [`StackRunner`](crate::StackRunner)
///
/// Orchestrators never propagate this; it always ends up as the detail of a
/// `*Failed` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} failed: {message}")]
pub struct CommandError {
    kind: CommandErrorKind,
    message: String,
}

impl CommandError {
    pub fn new(kind: CommandErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn apply(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Apply, message)
    }

    pub fn destroy(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Destroy, message)
    }

    pub fn lock_contention(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::LockContention, message)
    }

    pub fn program(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Program, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(CommandErrorKind::Backend, message)
    }

    pub fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether re-sending the same request may succeed without changes
    pub fn is_retryable(&self) -> bool {
        self.kind == CommandErrorKind::LockContention
    }
}
