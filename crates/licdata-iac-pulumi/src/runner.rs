//! StackRunner backed by the pulumi CLI

use crate::cli::Pulumi;
use crate::error::Result;
use crate::program::PulumiProgram;
use async_trait::async_trait;
use licdata_iac_core::{
    evaluate, CommandError, CommandErrorKind, DeclareFn, Declaration, Outcome, StackConfig,
    StackIdentity, StackRunner,
};
use std::path::{Path, PathBuf};

/// Default pulumi executable, resolved through `PATH`
pub const DEFAULT_BINARY: &str = "pulumi";

/// Runs each synchronization as a Pulumi YAML program
///
/// Every stack gets its own project directory under `work_dir`
/// (`<work_dir>/<project>/<stack>/Pulumi.yaml`). Pulumi's own state backend
/// and stack locks are used as configured in the environment.
pub struct PulumiRunner {
    binary: PathBuf,
    work_dir: PathBuf,
    backend_url: Option<String>,
}

impl PulumiRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            work_dir: work_dir.into(),
            backend_url: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// State backend passed as `PULUMI_BACKEND_URL` (e.g. `file://~`, `azblob://state`)
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = Some(url.into());
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn project_dir(&self, identity: &StackIdentity) -> PathBuf {
        self.work_dir
            .join(&identity.project_name)
            .join(&identity.stack_name)
    }

    fn pulumi(&self, identity: &StackIdentity) -> Pulumi {
        let pulumi = Pulumi::new(&self.binary, self.project_dir(identity));
        match &self.backend_url {
            Some(url) => pulumi.with_env("PULUMI_BACKEND_URL", url),
            None => pulumi,
        }
    }

    /// Writes the program, selects the stack and applies its config
    async fn prepare(
        &self,
        identity: &StackIdentity,
        program: &PulumiProgram,
        config: &StackConfig,
    ) -> Result<Pulumi> {
        let pulumi = self.pulumi(identity);
        program.write(pulumi.work_dir()).await?;

        let stack = &identity.stack_name;
        pulumi.select_stack(stack).await?;
        for (key, value) in config.iter() {
            pulumi.set_config(stack, key, value).await?;
        }
        Ok(pulumi)
    }

    async fn update(
        &self,
        identity: &StackIdentity,
        declaration: &Declaration,
        config: &StackConfig,
    ) -> Result<Outcome> {
        let program = PulumiProgram::from_declaration(&identity.project_name, declaration);
        let pulumi = self.prepare(identity, &program, config).await?;
        let stack = &identity.stack_name;

        pulumi.refresh(stack).await?;
        pulumi.up(stack).await?;

        let summary = pulumi.last_summary(stack, "update").await?;
        let outputs = pulumi.outputs(stack).await?;
        Ok(Outcome::from_summary(summary, outputs))
    }

    async fn teardown(&self, identity: &StackIdentity, config: &StackConfig) -> Result<Outcome> {
        let program = PulumiProgram::empty(&identity.project_name);
        let pulumi = self.prepare(identity, &program, config).await?;
        let stack = &identity.stack_name;

        pulumi.destroy(stack).await?;

        let summary = pulumi.last_summary(stack, "destroy").await?;
        Ok(Outcome::from_summary(summary, Default::default()))
    }
}

#[async_trait]
impl StackRunner for PulumiRunner {
    fn name(&self) -> &str {
        "pulumi"
    }

    async fn synchronize(
        &self,
        identity: &StackIdentity,
        program: &DeclareFn<'_>,
        config: &StackConfig,
    ) -> std::result::Result<Outcome, CommandError> {
        let declaration = evaluate(program)?;
        tracing::info!(
            "pulumi up {} ({} resources)",
            identity,
            declaration.len()
        );

        self.update(identity, &declaration, config)
            .await
            .map_err(|e| e.into_command_error(CommandErrorKind::Apply))
    }

    async fn destroy(
        &self,
        identity: &StackIdentity,
        config: &StackConfig,
    ) -> std::result::Result<Outcome, CommandError> {
        tracing::info!("pulumi destroy {}", identity);

        self.teardown(identity, config)
            .await
            .map_err(|e| e.into_command_error(CommandErrorKind::Destroy))
    }
}
