//! Process-level configuration (§6): the recognized options and their
//! effects on the orchestrator, loaded once at startup. Parsing of actual
//! config files and wiring it to a CLI is an outer-layer concern — this
//! crate only defines the typed, validated shape the core reads from.

use council_contracts::OrchestrationError;
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefaultExecutionMode {
    Fast,
    Balanced,
    BestQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExecutionConfig {
    pub default_mode: DefaultExecutionMode,
    #[validate(range(min = 1))]
    pub max_parallel_executions: u32,
    #[validate(range(min = 0.000001))]
    pub default_timeout_seconds: f64,
    pub enable_arbitration: bool,
    pub enable_synthesis: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_mode: DefaultExecutionMode::Balanced,
            max_parallel_executions: 8,
            default_timeout_seconds: 300.0,
            enable_arbitration: true,
            enable_synthesis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CostConfig {
    pub max_cost_per_request: f64,
    pub currency: String,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            max_cost_per_request: 5.0,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CoreConfig {
    #[validate(nested)]
    pub execution: ExecutionConfig,
    #[validate(nested)]
    pub cost: CostConfig,
    #[validate(range(min = 0.0, max = 1.0))]
    pub partial_failure_threshold: f64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionConfig::default(),
            cost: CostConfig::default(),
            partial_failure_threshold: 0.5,
        }
    }
}

impl CoreConfig {
    /// Load defaults overlaid with `COUNCIL_*` environment variables
    /// (e.g. `COUNCIL_EXECUTION.MAX_PARALLEL_EXECUTIONS=16`), then validate.
    /// Validation failure is the one unrecoverable failure in the core: it
    /// refuses to initialize rather than proceed with a bad config.
    pub fn load() -> Result<Self, OrchestrationError> {
        let config: CoreConfig = Figment::new()
            .merge(Serialized::defaults(CoreConfig::default()))
            .merge(Env::prefixed("COUNCIL_").split("__"))
            .extract()
            .map_err(|e| {
                error!(error = %e, "failed to load configuration");
                OrchestrationError::Configuration(e.to_string())
            })?;

        config.validate().map_err(|e| {
            error!(error = %e, "configuration failed validation");
            OrchestrationError::Configuration(e.to_string())
        })?;

        info!(
            default_mode = ?config.execution.default_mode,
            max_parallel_executions = config.execution.max_parallel_executions,
            "configuration loaded"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = CoreConfig::default();
        config.partial_failure_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_parallelism() {
        let mut config = CoreConfig::default();
        config.execution.max_parallel_executions = 0;
        assert!(config.validate().is_err());
    }
}
