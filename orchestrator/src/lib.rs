//! Pipelined multi-model orchestration: turns one piece of free-text
//! content into a synthesized response by routing typed subtasks through
//! independently circuit-broken stages and publishing progress on an
//! ordered event bus.

pub mod analysis;
pub mod arbitration;
pub mod cost;
pub mod cost_discrepancy;
pub mod decomposition;
pub mod event_bus;
pub mod execution;
pub mod orchestrator;
pub mod resilience_manager;
pub mod router;
pub mod synthesis;

pub use event_bus::EventBus;
pub use orchestrator::Orchestrator;
pub use resilience_manager::{PartialFailureOutcome, ResilienceManager};
