//! Stack capability contract

use crate::declaration::{Declaration, ResourceRef};
use crate::error::Result;
use crate::image::DockerImage;
use crate::runner::{StackConfig, StackOutputs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The (stack, project, location) triple addressing one provisioned unit
///
/// Values are used verbatim; no validation happens here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackIdentity {
    pub stack_name: String,
    pub project_name: String,
    pub location: String,
}

impl StackIdentity {
    pub fn new(
        stack_name: impl Into<String>,
        project_name: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            stack_name: stack_name.into(),
            project_name: project_name.into(),
            location: location.into(),
        }
    }
}

impl std::fmt::Display for StackIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.project_name, self.stack_name, self.location
        )
    }
}

/// Handles to the resources one declare step registered, keyed by logical name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredResources {
    resources: BTreeMap<String, ResourceRef>,
}

/// Result of [`Stack::declare_infrastructure`]
pub type InfrastructureResources = DeclaredResources;

/// Result of [`Stack::declare_docker_resources`]
pub type DockerResources = DeclaredResources;

impl DeclaredResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: ResourceRef) {
        self.resources.insert(resource.name.clone(), resource);
    }

    pub fn get(&self, name: &str) -> Option<&ResourceRef> {
        self.resources.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceRef> {
        self.resources.values()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<ResourceRef> for DeclaredResources {
    fn from_iter<I: IntoIterator<Item = ResourceRef>>(iter: I) -> Self {
        let mut declared = Self::new();
        for resource in iter {
            declared.insert(resource);
        }
        declared
    }
}

/// Container registry access read back from stack outputs
///
/// Each field is `None` while the backing resource does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub registry_url: Option<String>,
}

impl RegistryCredentials {
    pub fn is_complete(&self) -> bool {
        self.username.is_some() && self.password.is_some() && self.registry_url.is_some()
    }
}

/// A provisionable unit of infrastructure
///
/// Implementations describe desired state only; applying it is the job of a
/// [`StackRunner`](crate::StackRunner).
pub trait Stack: Send + Sync {
    fn identity(&self) -> &StackIdentity;

    /// Provider settings the runner must apply before synchronizing
    fn config(&self) -> StackConfig;

    /// Declares the base resources
    ///
    /// Must be deterministic for a given identity so that re-running it
    /// against a synchronized stack yields no changes.
    fn declare_infrastructure(&self, declaration: &mut Declaration)
    -> Result<InfrastructureResources>;

    /// Declares resources that run a published container image
    ///
    /// Fails with [`IacError::Precondition`](crate::IacError::Precondition)
    /// unless every resource in `base` is already part of `declaration`.
    fn declare_docker_resources(
        &self,
        declaration: &mut Declaration,
        base: &InfrastructureResources,
        image: &DockerImage,
    ) -> Result<DockerResources>;

    /// Reads registry credentials from the outputs of a successful synchronization
    fn retrieve_container_registry_credentials(&self, outputs: &StackOutputs)
    -> RegistryCredentials;
}

/// Builds the [`Stack`] for an identity
pub trait StackFactory: Send + Sync {
    fn create(&self, identity: &StackIdentity) -> Box<dyn Stack>;
}
