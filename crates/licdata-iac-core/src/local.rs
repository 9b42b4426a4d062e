//! File-backed stack runner
//!
//! Records the declared desired state in a per-stack state file and reports
//! what changed since the previous synchronization. It provisions nothing on
//! a real provider, which makes it the backend for dry runs, local
//! development and tests.

use crate::declaration::Declaration;
use crate::error::{CommandError, IacError};
use crate::runner::{evaluate, DeclareFn, Outcome, StackConfig, StackOutputs, StackRunner};
use crate::stack::StackIdentity;
use crate::state::{ResourceState, StackState, StateLock, StateManager};
use crate::summary::{ResourceChange, ResourceOp};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;

pub struct LocalStateRunner {
    state: StateManager,
}

impl LocalStateRunner {
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state: StateManager::new(state_dir),
        }
    }

    pub fn in_project(project_root: impl AsRef<Path>) -> Self {
        Self {
            state: StateManager::in_project(project_root),
        }
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    async fn lock(&self, identity: &StackIdentity) -> Result<StateLock, CommandError> {
        self.state.acquire_lock(identity).await.map_err(|e| match e {
            IacError::LockError(msg) => CommandError::lock_contention(msg),
            other => CommandError::backend(other.to_string()),
        })
    }

    async fn unlock(&self, lock: StateLock) {
        if let Err(e) = lock.release().await {
            tracing::warn!("Failed to release state lock: {}", e);
        }
    }

    async fn apply(
        &self,
        identity: &StackIdentity,
        declaration: &Declaration,
        config: &StackConfig,
    ) -> crate::Result<Outcome> {
        let current = self.state.load(identity).await?;
        let mut next = StackState::new(identity.clone());
        next.config = config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut changes = Vec::new();
        for desired in declaration.resources() {
            let op = match current.get_resource(&desired.name) {
                None => ResourceOp::Create,
                Some(existing) if existing.matches(desired) => ResourceOp::Same,
                Some(_) => ResourceOp::Update,
            };

            let mut recorded = ResourceState::from_config(desired);
            if let Some(existing) = current.get_resource(&desired.name) {
                recorded.created_at = existing.created_at;
                if op == ResourceOp::Same {
                    recorded.updated_at = existing.updated_at;
                }
            }

            tracing::debug!("{} {} ({})", op, desired.name, desired.resource_type);
            changes.push(ResourceChange::new(&desired.name, &desired.resource_type, op));
            next.set_resource(desired.name.clone(), recorded);
        }

        for (name, existing) in &current.resources {
            if !declaration.contains(name) {
                tracing::debug!("delete {} ({})", name, existing.resource_type);
                changes.push(ResourceChange::new(
                    name,
                    &existing.resource_type,
                    ResourceOp::Delete,
                ));
            }
        }

        next.outputs = resolve_outputs(declaration);
        next.updated_at = Utc::now();
        self.state.save(&next).await?;

        Ok(Outcome::new(changes, next.outputs))
    }

    async fn teardown(&self, identity: &StackIdentity) -> crate::Result<Outcome> {
        let current = self.state.load(identity).await?;
        let changes = current
            .resources
            .iter()
            .map(|(name, r)| ResourceChange::new(name, &r.resource_type, ResourceOp::Delete))
            .collect();

        self.state.remove(identity).await?;
        Ok(Outcome::new(changes, StackOutputs::new()))
    }
}

#[async_trait]
impl StackRunner for LocalStateRunner {
    fn name(&self) -> &str {
        "local"
    }

    async fn synchronize(
        &self,
        identity: &StackIdentity,
        program: &DeclareFn<'_>,
        config: &StackConfig,
    ) -> Result<Outcome, CommandError> {
        let declaration = evaluate(program)?;

        let lock = self.lock(identity).await?;
        let result = self.apply(identity, &declaration, config).await;
        self.unlock(lock).await;

        result.map_err(|e| CommandError::apply(e.to_string()))
    }

    async fn destroy(
        &self,
        identity: &StackIdentity,
        _config: &StackConfig,
    ) -> Result<Outcome, CommandError> {
        let lock = self.lock(identity).await?;
        let result = self.teardown(identity).await;
        self.unlock(lock).await;

        result.map_err(|e| CommandError::destroy(e.to_string()))
    }
}

/// Resolves exported outputs against declared resource properties
///
/// Outputs referring to anything the local backend cannot know (provider
/// computed attributes, function results) are left out.
fn resolve_outputs(declaration: &Declaration) -> StackOutputs {
    declaration
        .outputs()
        .iter()
        .filter_map(|(name, template)| match interpolate(template, declaration) {
            Some(value) => Some((name.clone(), value)),
            None => {
                tracing::debug!("Output {} is not known to the local backend", name);
                None
            }
        })
        .collect()
}

fn interpolate(template: &str, declaration: &Declaration) -> Option<String> {
    let mut result = String::new();
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        let (resource, property) = after[..end].split_once('.')?;
        let value = declaration.get(resource)?.properties.get(property)?;
        match value {
            serde_json::Value::String(s) => result.push_str(s),
            serde_json::Value::Number(n) => result.push_str(&n.to_string()),
            serde_json::Value::Bool(b) => result.push_str(&b.to_string()),
            _ => return None,
        }
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::ResourceConfig;
    use crate::error::CommandErrorKind;
    use serde_json::json;
    use tempfile::tempdir;

    fn acme() -> StackIdentity {
        StackIdentity::new("acme-prod", "licdata", "westeurope")
    }

    fn base(decl: &mut Declaration) -> crate::Result<()> {
        let group = decl.register(ResourceConfig::new(
            "resourceGroup",
            "azure-native:resources:ResourceGroup",
            json!({ "resourceGroupName": "rg-licdata-acme-prod", "location": "westeurope" }),
        ))?;
        decl.register(
            ResourceConfig::new(
                "containerRegistry",
                "azure-native:containerregistry:Registry",
                json!({ "registryName": "crlicdataacmeprod", "resourceGroupName": group.output("name") }),
            )
            .depends_on(&group),
        )?;
        decl.export("registryName", "${containerRegistry.registryName}");
        decl.export("loginServer", "${containerRegistry.loginServer}");
        Ok(())
    }

    #[tokio::test]
    async fn test_second_synchronize_is_a_no_op() {
        let temp_dir = tempdir().unwrap();
        let runner = LocalStateRunner::in_project(temp_dir.path());
        let config = StackConfig::new().with("azure-native:location", "westeurope");

        let first = runner.synchronize(&acme(), &base, &config).await.unwrap();
        assert_eq!(first.summary.create, 2);

        let second = runner.synchronize(&acme(), &base, &config).await.unwrap();
        assert!(!second.summary.has_changes());
        assert_eq!(second.summary.same, 2);
    }

    #[tokio::test]
    async fn test_changed_and_dropped_resources() {
        let temp_dir = tempdir().unwrap();
        let runner = LocalStateRunner::in_project(temp_dir.path());
        let config = StackConfig::new();

        runner.synchronize(&acme(), &base, &config).await.unwrap();

        let moved = |decl: &mut Declaration| -> crate::Result<()> {
            decl.register(ResourceConfig::new(
                "resourceGroup",
                "azure-native:resources:ResourceGroup",
                json!({ "resourceGroupName": "rg-licdata-acme-prod", "location": "northeurope" }),
            ))?;
            Ok(())
        };
        let outcome = runner.synchronize(&acme(), &moved, &config).await.unwrap();
        assert_eq!(outcome.summary.update, 1);
        assert_eq!(outcome.summary.delete, 1);
        assert!(outcome
            .changes
            .iter()
            .any(|c| c.name == "containerRegistry" && c.op == ResourceOp::Delete));
    }

    #[tokio::test]
    async fn test_outputs_resolve_known_properties_only() {
        let temp_dir = tempdir().unwrap();
        let runner = LocalStateRunner::in_project(temp_dir.path());

        let outcome = runner
            .synchronize(&acme(), &base, &StackConfig::new())
            .await
            .unwrap();
        assert_eq!(outcome.outputs.get("registryName"), Some("crlicdataacmeprod"));
        assert_eq!(outcome.outputs.get("loginServer"), None);
    }

    #[tokio::test]
    async fn test_locked_stack_reports_contention() {
        let temp_dir = tempdir().unwrap();
        let runner = LocalStateRunner::in_project(temp_dir.path());

        let _held = runner.state().acquire_lock(&acme()).await.unwrap();
        let err = runner
            .synchronize(&acme(), &base, &StackConfig::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CommandErrorKind::LockContention);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_destroy_deletes_everything() {
        let temp_dir = tempdir().unwrap();
        let runner = LocalStateRunner::in_project(temp_dir.path());
        runner.synchronize(&acme(), &base, &StackConfig::new()).await.unwrap();

        let outcome = runner.destroy(&acme(), &StackConfig::new()).await.unwrap();
        assert_eq!(outcome.summary.delete, 2);
        assert!(!runner.state().state_path(&acme()).exists());

        let again = runner.destroy(&acme(), &StackConfig::new()).await.unwrap();
        assert_eq!(again.summary.total(), 0);
    }

    #[test]
    fn test_interpolate_embedded_reference() {
        let mut decl = Declaration::new();
        decl.register(ResourceConfig::new(
            "containerRegistry",
            "azure-native:containerregistry:Registry",
            json!({ "registryName": "crlicdata" }),
        ))
        .unwrap();

        assert_eq!(
            interpolate("https://${containerRegistry.registryName}.azurecr.io", &decl),
            Some("https://crlicdata.azurecr.io".to_string())
        );
        assert_eq!(interpolate("${registryCredentials.username}", &decl), None);
        assert_eq!(interpolate("plain", &decl), Some("plain".to_string()));
    }
}
