//! Azure flavour of the Licdata stack
//!
//! Declares the base infrastructure (resource group, function storage
//! account, app service plan, Application Insights, container registry) and
//! the Docker-dependent resources (web app plus the role that lets it pull
//! from the registry) as `azure-native` resources.
//!
//! # Example
//!
//! ```ignore
//! use licdata_iac_azure::AzureStackFactory;
//! use licdata_iac_core::{ImageSettings, LocalStateRunner, StackOperationFactory};
//! use std::sync::Arc;
//!
//! let factory = StackOperationFactory::new(
//!     Arc::new(LocalStateRunner::in_project(".")),
//!     Arc::new(AzureStackFactory::new()),
//!     ImageSettings::default(),
//! );
//! let events = factory.dispatch(&request).await;
//! ```

pub mod factory;
pub mod naming;
pub mod stack;

pub use factory::AzureStackFactory;
pub use stack::{outputs, resources, AzureStack, LOCATION_CONFIG};
