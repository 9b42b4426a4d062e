//! Provisioning backend abstraction

use crate::declaration::Declaration;
use crate::error::{CommandError, IacError};
use crate::stack::StackIdentity;
use crate::summary::{DiffSummary, ResourceChange};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A declare function handed to the backend's evaluation loop
pub type DeclareFn<'a> = dyn Fn(&mut Declaration) -> crate::Result<()> + Send + Sync + 'a;

/// Provisioning backend abstraction trait
///
/// Backends (local state file, Pulumi CLI, test doubles) implement this trait
/// to reconcile actual infrastructure with the state a declare function
/// describes. Both calls either fully succeed or fail with a
/// [`CommandError`]; callers never see partial results.
#[async_trait]
pub trait StackRunner: Send + Sync {
    /// Returns the backend name (e.g., "local", "pulumi")
    fn name(&self) -> &str;

    /// Brings the stack in line with what `program` declares
    async fn synchronize(
        &self,
        identity: &StackIdentity,
        program: &DeclareFn<'_>,
        config: &StackConfig,
    ) -> Result<Outcome, CommandError>;

    /// Deletes every resource of the stack
    async fn destroy(
        &self,
        identity: &StackIdentity,
        config: &StackConfig,
    ) -> Result<Outcome, CommandError>;
}

/// Runs a declare function into a fresh [`Declaration`]
///
/// Declaration failures are programming defects of the stack; they are
/// logged and reported as [`CommandErrorKind::Program`](crate::CommandErrorKind::Program).
pub fn evaluate(program: &DeclareFn<'_>) -> Result<Declaration, CommandError> {
    let mut declaration = Declaration::new();
    match program(&mut declaration) {
        Ok(()) => Ok(declaration),
        Err(IacError::Command(e)) => Err(e),
        Err(e) => {
            if matches!(e, IacError::Precondition(_)) {
                tracing::error!("Declaration defect: {}", e);
            }
            Err(CommandError::program(e.to_string()))
        }
    }
}

/// Provider-specific settings for one synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackConfig {
    values: BTreeMap<String, String>,
}

impl StackConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outputs exported by the last successful synchronization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackOutputs {
    values: BTreeMap<String, String>,
}

impl StackOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for StackOutputs {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Result of a successful synchronize or destroy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub summary: DiffSummary,

    /// Per-resource detail, when the backend reports it
    #[serde(default)]
    pub changes: Vec<ResourceChange>,

    #[serde(default)]
    pub outputs: StackOutputs,
}

impl Outcome {
    pub fn new(changes: Vec<ResourceChange>, outputs: StackOutputs) -> Self {
        Self {
            summary: DiffSummary::from_changes(&changes),
            changes,
            outputs,
        }
    }

    pub fn from_summary(summary: DiffSummary, outputs: StackOutputs) -> Self {
        Self {
            summary,
            changes: Vec::new(),
            outputs,
        }
    }
}
