//! Shared data contracts for the model council orchestration core: the
//! entity types every stage passes between each other, the event envelope
//! published on the bus, and the external model capability the core
//! consumes.

pub mod error;
pub mod events;
pub mod model;
mod schema;
pub mod types;

pub use error::{ContractError, OrchestrationError};
pub use events::{EventEnvelope, ExecutionStatus, RoutingAssignment, StageEvent, SynthesisStage};
pub use model::{GenerateOptions, Model, ModelCallError, ModelRegistry};
pub use types::*;
