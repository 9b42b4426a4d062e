//! Pulumi YAML program rendering

use crate::error::Result;
use licdata_iac_core::Declaration;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const PROGRAM_FILE: &str = "Pulumi.yaml";

/// A `Pulumi.yaml` with `runtime: yaml`
#[derive(Debug, Clone, Serialize)]
pub struct PulumiProgram {
    name: String,
    runtime: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, serde_json::Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resources: BTreeMap<String, ProgramResource>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
struct ProgramResource {
    #[serde(rename = "type")]
    resource_type: String,

    properties: serde_json::Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ResourceOptions>,
}

#[derive(Debug, Clone, Serialize)]
struct ResourceOptions {
    #[serde(rename = "dependsOn")]
    depends_on: Vec<String>,
}

impl PulumiProgram {
    /// A program declaring nothing; `up` against it deletes every resource
    pub fn empty(project: impl Into<String>) -> Self {
        Self {
            name: project.into(),
            runtime: "yaml".to_string(),
            variables: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn from_declaration(project: impl Into<String>, declaration: &Declaration) -> Self {
        let mut program = Self::empty(project);

        program.variables = declaration.variables().clone();
        program.outputs = declaration.outputs().clone();
        for resource in declaration.resources() {
            let options = (!resource.depends_on.is_empty()).then(|| ResourceOptions {
                depends_on: resource
                    .depends_on
                    .iter()
                    .map(|name| format!("${{{}}}", name))
                    .collect(),
            });
            program.resources.insert(
                resource.name.clone(),
                ProgramResource {
                    resource_type: resource.resource_type.clone(),
                    properties: resource.properties.clone(),
                    options,
                },
            );
        }
        program
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Writes `Pulumi.yaml` into `dir`, replacing any previous program
    pub async fn write(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(PROGRAM_FILE);
        tokio::fs::write(&path, self.to_yaml()?).await?;
        tracing::debug!(
            "Wrote {} resources to {}",
            self.resources.len(),
            path.display()
        );
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use licdata_iac_core::ResourceConfig;
    use serde_json::json;

    fn declaration() -> Declaration {
        let mut decl = Declaration::new();
        let group = decl
            .register(ResourceConfig::new(
                "resourceGroup",
                "azure-native:resources:ResourceGroup",
                json!({ "resourceGroupName": "rg-licdata-acme-prod" }),
            ))
            .unwrap();
        let registry = decl
            .register(
                ResourceConfig::new(
                    "containerRegistry",
                    "azure-native:containerregistry:Registry",
                    json!({ "resourceGroupName": group.output("name"), "adminUserEnabled": true }),
                )
                .depends_on(&group),
            )
            .unwrap();
        decl.variable(
            "registryCredentials",
            json!({
                "fn::invoke": {
                    "function": "azure-native:containerregistry:listRegistryCredentials",
                    "arguments": { "registryName": registry.output("name") },
                },
            }),
        );
        decl.export("CONTAINER_REGISTRY_URL", registry.output("loginServer"));
        decl
    }

    #[test]
    fn test_renders_pulumi_yaml() {
        let program = PulumiProgram::from_declaration("licdata", &declaration());
        let value: serde_yaml::Value = serde_yaml::from_str(&program.to_yaml().unwrap()).unwrap();

        assert_eq!(value["name"].as_str(), Some("licdata"));
        assert_eq!(value["runtime"].as_str(), Some("yaml"));
        assert_eq!(
            value["resources"]["containerRegistry"]["type"].as_str(),
            Some("azure-native:containerregistry:Registry")
        );
        assert_eq!(
            value["resources"]["containerRegistry"]["properties"]["resourceGroupName"].as_str(),
            Some("${resourceGroup.name}")
        );
        assert_eq!(
            value["resources"]["containerRegistry"]["options"]["dependsOn"][0].as_str(),
            Some("${resourceGroup}")
        );
        assert!(value["resources"]["resourceGroup"].get("options").is_none());
        assert_eq!(
            value["variables"]["registryCredentials"]["fn::invoke"]["function"].as_str(),
            Some("azure-native:containerregistry:listRegistryCredentials")
        );
        assert_eq!(
            value["outputs"]["CONTAINER_REGISTRY_URL"].as_str(),
            Some("${containerRegistry.loginServer}")
        );
    }

    #[test]
    fn test_empty_program_has_no_sections() {
        let yaml = PulumiProgram::empty("licdata").to_yaml().unwrap();
        assert!(!yaml.contains("resources"));
        assert!(!yaml.contains("outputs"));
    }

    #[tokio::test]
    async fn test_write_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("licdata").join("acme-prod");

        let path = PulumiProgram::from_declaration("licdata", &declaration())
            .write(&dir)
            .await
            .unwrap();

        assert_eq!(path, dir.join(PROGRAM_FILE));
        let content = tokio::fs::read_to_string(path).await.unwrap();
        assert!(content.contains("runtime: yaml"));
    }
}
