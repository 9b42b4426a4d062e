//! pulumi CLI wrapper
//!
//! Runs pulumi commands inside one project directory.

use crate::error::{PulumiError, Result};
use licdata_iac_core::{DiffSummary, StackOutputs};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// pulumi CLI wrapper bound to a project directory
pub struct Pulumi {
    binary: PathBuf,
    work_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl Pulumi {
    pub fn new(binary: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            work_dir: work_dir.into(),
            env: Vec::new(),
        }
    }

    /// Adds an environment variable to every invocation
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Run a pulumi command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.arg("--non-interactive");
        cmd.current_dir(&self.work_dir);
        cmd.env("PULUMI_SKIP_UPDATE_CHECK", "true");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!(
            "Running: {} {} (in {})",
            self.binary.display(),
            args.join(" "),
            self.work_dir.display()
        );

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PulumiError::PulumiNotFound(self.binary.display().to_string())
            }
            _ => PulumiError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PulumiError::from_stderr(&stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Selects `stack`, creating it when missing
    pub async fn select_stack(&self, stack: &str) -> Result<()> {
        self.run_command(&["stack", "select", "--create", stack])
            .await?;
        Ok(())
    }

    pub async fn set_config(&self, stack: &str, key: &str, value: &str) -> Result<()> {
        self.run_command(&["config", "set", key, value, "--stack", stack])
            .await?;
        Ok(())
    }

    /// Reconciles recorded state with what actually exists
    pub async fn refresh(&self, stack: &str) -> Result<()> {
        self.run_command(&["refresh", "--yes", "--stack", stack])
            .await?;
        Ok(())
    }

    pub async fn up(&self, stack: &str) -> Result<()> {
        self.run_command(&["up", "--yes", "--skip-preview", "--stack", stack])
            .await?;
        Ok(())
    }

    pub async fn destroy(&self, stack: &str) -> Result<()> {
        self.run_command(&["destroy", "--yes", "--skip-preview", "--stack", stack])
            .await?;
        Ok(())
    }

    /// Update history, most recent first
    pub async fn history(&self, stack: &str) -> Result<Vec<UpdateRecord>> {
        let output = self
            .run_command(&["stack", "history", "--json", "--stack", stack])
            .await?;

        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&output)?)
    }

    /// Resource changes of the most recent update of `kind`
    pub async fn last_summary(&self, stack: &str, kind: &str) -> Result<DiffSummary> {
        let history = self.history(stack).await?;
        let record = history
            .into_iter()
            .find(|r| r.kind == kind)
            .ok_or_else(|| PulumiError::UnexpectedOutput(format!("no {} in stack history", kind)))?;
        Ok(record.summary())
    }

    /// Stack outputs with secrets in plain text
    pub async fn outputs(&self, stack: &str) -> Result<StackOutputs> {
        let output = self
            .run_command(&["stack", "output", "--json", "--show-secrets", "--stack", stack])
            .await?;

        if output.trim().is_empty() {
            return Ok(StackOutputs::new());
        }
        let values: BTreeMap<String, serde_json::Value> = serde_json::from_str(&output)?;
        Ok(flatten_outputs(values))
    }
}

/// One entry of `pulumi stack history --json`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord {
    pub kind: String,

    #[serde(default)]
    pub result: String,

    #[serde(default)]
    pub resource_changes: Option<BTreeMap<String, usize>>,
}

impl UpdateRecord {
    pub fn summary(&self) -> DiffSummary {
        match &self.resource_changes {
            Some(changes) => DiffSummary::from_resource_changes(changes),
            None => DiffSummary::empty(),
        }
    }
}

/// Output values become strings; strings stay verbatim, anything else is JSON
fn flatten_outputs(values: BTreeMap<String, serde_json::Value>) -> StackOutputs {
    values
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect()
}
