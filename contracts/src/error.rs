//! The error taxonomy the orchestrator reasons about.
//!
//! These are kinds, not an exception hierarchy: each variant says what
//! happened and which breaker (if any) counts it, but none of them escape
//! `process_request` — every one is translated into a [`crate::FinalResponse`]
//! with `success = false` before the orchestrator returns.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("decomposition failed: {0}")]
    Decomposition(String),

    #[error("arbitration failed: {0}")]
    Arbitration(String),

    #[error("synthesis failed: {0}")]
    Synthesis(String),

    #[error("model call timed out after {duration_ms}ms")]
    ModelTimeout { duration_ms: u64 },

    #[error("provider rate limited: {0}")]
    RateLimit(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("response below accuracy requirement: required {required}, got {actual}")]
    QualityFailure { required: f64, actual: f64 },

    #[error("circuit breaker '{component}' is open")]
    CircuitOpen { component: String },

    #[error("partial failure: {failed}/{total} subtasks failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("system overload: {0}")]
    SystemOverload(String),
}

impl OrchestrationError {
    /// The error-taxonomy label used in `error_type`-style fields and log lines.
    pub fn kind_label(&self) -> &'static str {
        match self {
            OrchestrationError::Configuration(_) => "ConfigurationError",
            OrchestrationError::Validation(_) => "ValidationError",
            OrchestrationError::Analysis(_) => "AnalysisError",
            OrchestrationError::Decomposition(_) => "DecompositionError",
            OrchestrationError::Arbitration(_) => "ArbitrationError",
            OrchestrationError::Synthesis(_) => "SynthesisError",
            OrchestrationError::ModelTimeout { .. } => "ModelTimeoutError",
            OrchestrationError::RateLimit(_) => "RateLimitError",
            OrchestrationError::ModelUnavailable(_) => "ModelUnavailable",
            OrchestrationError::QualityFailure { .. } => "QualityFailure",
            OrchestrationError::CircuitOpen { .. } => "CircuitOpenError",
            OrchestrationError::PartialFailure { .. } => "PartialFailure",
            OrchestrationError::SystemOverload(_) => "SystemOverload",
        }
    }
}

/// Contract (schema) validation errors, kept distinct from
/// [`OrchestrationError`] because they concern wire shape, not pipeline
/// behavior.
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("event payload failed schema validation: {0}")]
    Validation(String),

    #[error("event payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
