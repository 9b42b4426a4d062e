//! Licdata infrastructure lifecycle orchestration
//!
//! Turns lifecycle requests ("update infrastructure", "update Docker
//! resources", "remove infrastructure", "remove Docker resources") into
//! synchronizations of a stack and answers each request with the outcome
//! events, chained to the request they respond to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │            licdata-iac CLI / event bus            │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Event
//! ┌─────────────────▼───────────────────────────────┐
//! │              StackOperationFactory               │
//! │  ┌──────────────────┐  ┌─────────────────────┐  │
//! │  │ Infrastructure   │◄─┤ DockerResource      │  │
//! │  │ Orchestrator     │  │ Orchestrator        │  │
//! │  └────────┬─────────┘  └─────────────────────┘  │
//! │           │ trait Stack (declare)                │
//! └───────────┼─────────────────────────────────────┘
//!             │ trait StackRunner (synchronize/destroy)
//! ┌───────────▼───────┐ ┌───────────────────┐
//! │ LocalStateRunner  │ │   PulumiRunner    │
//! └───────────────────┘ └───────────────────┘
//! ```

pub mod declaration;
pub mod error;
pub mod event;
pub mod factory;
pub mod image;
pub mod local;
pub mod operation;
pub mod orchestrator;
pub mod runner;
pub mod stack;
pub mod state;
pub mod summary;

// Re-exports
pub use declaration::{Declaration, ResourceConfig, ResourceRef};
pub use error::{CommandError, CommandErrorKind, IacError, Result};
pub use event::{keys, Event, EventId, EventKind, Metadata};
pub use factory::StackOperationFactory;
pub use image::{DockerImage, ImageSettings};
pub use local::LocalStateRunner;
pub use operation::StackOperation;
pub use orchestrator::{DockerResourceOrchestrator, InfrastructureOrchestrator, SyncState};
pub use runner::{evaluate, DeclareFn, Outcome, StackConfig, StackOutputs, StackRunner};
pub use stack::{
    DeclaredResources, DockerResources, InfrastructureResources, RegistryCredentials, Stack,
    StackFactory, StackIdentity,
};
pub use state::{ResourceState, StackState, StateLock, StateManager};
pub use summary::{DiffSummary, ResourceChange, ResourceOp};
