//! Pulumi backend error types

use licdata_iac_core::{CommandError, CommandErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulumiError {
    #[error("pulumi not found ({0}). Please install: https://www.pulumi.com/docs/install/")]
    PulumiNotFound(String),

    #[error("Stack is locked by another update: {0}")]
    StackLocked(String),

    #[error("pulumi command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected pulumi output: {0}")]
    UnexpectedOutput(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PulumiError>;

/// stderr fragments pulumi prints when another update holds the stack
const LOCK_MARKERS: [&str; 3] = [
    "the stack is currently locked",
    "another update is currently in progress",
    "conflict: another update",
];

impl PulumiError {
    /// Classifies a failed command by its stderr
    pub fn from_stderr(stderr: &str) -> Self {
        let message = stderr.trim().to_string();
        let lowered = message.to_lowercase();
        if LOCK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            PulumiError::StackLocked(message)
        } else {
            PulumiError::CommandFailed(message)
        }
    }

    /// Converts into the backend-neutral error, using `fallback` for
    /// failures of the operation itself
    pub fn into_command_error(self, fallback: CommandErrorKind) -> CommandError {
        let kind = match &self {
            PulumiError::StackLocked(_) => CommandErrorKind::LockContention,
            PulumiError::PulumiNotFound(_) | PulumiError::IoError(_) => CommandErrorKind::Backend,
            PulumiError::YamlError(_) => CommandErrorKind::Program,
            PulumiError::CommandFailed(_)
            | PulumiError::UnexpectedOutput(_)
            | PulumiError::JsonError(_) => fallback,
        };
        CommandError::new(kind, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locked_stack_is_contention() {
        let stderr = "error: the stack is currently locked by 1 lock(s). Either wait for the \
                      other process(es) to end or delete the lock file with `pulumi cancel`.\n";
        let err = PulumiError::from_stderr(stderr).into_command_error(CommandErrorKind::Apply);

        assert_eq!(err.kind(), CommandErrorKind::LockContention);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_service_conflict_is_contention() {
        let stderr = "error: [409] Conflict: Another update is currently in progress.";
        assert!(matches!(
            PulumiError::from_stderr(stderr),
            PulumiError::StackLocked(_)
        ));
    }

    #[test]
    fn test_other_failures_use_fallback() {
        let err = PulumiError::from_stderr("error: quota exceeded")
            .into_command_error(CommandErrorKind::Destroy);

        assert_eq!(err.kind(), CommandErrorKind::Destroy);
        assert!(err.message().contains("quota exceeded"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_missing_binary_is_backend() {
        let err = PulumiError::PulumiNotFound("pulumi".into())
            .into_command_error(CommandErrorKind::Apply);
        assert_eq!(err.kind(), CommandErrorKind::Backend);
    }
}
