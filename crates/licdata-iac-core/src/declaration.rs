//! Desired-state declarations
//!
//! A declare function registers resources, provider function invocations
//! ("variables") and exported outputs into a [`Declaration`]. Cross-resource
//! references use `${name.property}` interpolations, which every backend
//! resolves on its own terms.

use crate::error::{IacError, Result};
use crate::stack::DeclaredResources;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle to a registered resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Logical name, unique within a declaration
    pub name: String,

    /// Provider type token (e.g. "azure-native:resources:ResourceGroup")
    pub resource_type: String,
}

impl ResourceRef {
    /// Interpolation of one of this resource's properties
    pub fn output(&self, property: &str) -> String {
        format!("${{{}.{}}}", self.name, property)
    }

    /// Interpolation of this resource's provider id
    pub fn id(&self) -> String {
        self.output("id")
    }
}

/// Configuration for a declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    pub resource_type: String,

    /// Provider input properties
    pub properties: serde_json::Value,

    /// Logical names this resource must be created after
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ResourceConfig {
    pub fn new(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, resource: &ResourceRef) -> Self {
        if !self.depends_on.contains(&resource.name) {
            self.depends_on.push(resource.name.clone());
        }
        self
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef {
            name: self.name.clone(),
            resource_type: self.resource_type.clone(),
        }
    }

    /// Get a property value as a specific type
    pub fn get_property<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.properties
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Everything one declare function asked for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Declaration {
    resources: Vec<ResourceConfig>,
    variables: BTreeMap<String, serde_json::Value>,
    outputs: BTreeMap<String, String>,
}

impl Declaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource, rejecting duplicate logical names
    pub fn register(&mut self, resource: ResourceConfig) -> Result<ResourceRef> {
        if self.contains(&resource.name) {
            return Err(IacError::DuplicateResource(resource.name));
        }
        tracing::debug!(
            "Declared {} ({})",
            resource.name,
            resource.resource_type
        );
        let handle = resource.to_ref();
        self.resources.push(resource);
        Ok(handle)
    }

    /// Declares a provider function invocation addressable as `${name...}`
    pub fn variable(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.variables.insert(name.into(), value);
    }

    /// Exports a stack output
    pub fn export(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.outputs.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name)
    }

    /// Fails unless every resource in `required` was declared here
    pub fn require(&self, required: &DeclaredResources) -> Result<()> {
        let missing: Vec<&str> = required
            .iter()
            .filter(|r| !self.contains(&r.name))
            .map(|r| r.name.as_str())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(IacError::Precondition(format!(
                "base infrastructure not declared: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn get(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &ResourceConfig> {
        self.resources.iter()
    }

    pub fn variables(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.variables
    }

    pub fn outputs(&self) -> &BTreeMap<String, String> {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
