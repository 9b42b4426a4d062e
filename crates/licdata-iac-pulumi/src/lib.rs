//! Pulumi backend for licdata-iac
//!
//! Implements [`StackRunner`](licdata_iac_core::StackRunner) by rendering the
//! stack's declaration as a Pulumi YAML program and driving the `pulumi` CLI
//! against it.
//!
//! # Requirements
//!
//! - `pulumi` CLI must be installed
//! - A state backend must be reachable (`pulumi login`, or
//!   [`PulumiRunner::with_backend_url`])
//! - Provider credentials (e.g. `az login`) are taken from the environment
//!
//! # Example
//!
//! ```ignore
//! use licdata_iac_pulumi::PulumiRunner;
//!
//! let runner = PulumiRunner::new("/var/lib/licdata-iac")
//!     .with_backend_url("file:///var/lib/licdata-iac/state");
//! let outcome = runner.synchronize(&identity, &program, &stack.config()).await?;
//! println!("{}", outcome.summary);
//! ```

pub mod cli;
pub mod error;
pub mod program;
pub mod runner;

pub use cli::{Pulumi, UpdateRecord};
pub use error::{PulumiError, Result};
pub use program::{PulumiProgram, PROGRAM_FILE};
pub use runner::{PulumiRunner, DEFAULT_BINARY};
