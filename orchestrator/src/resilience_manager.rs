//! Owns the pipeline's four stage circuit breakers, the adaptive timeout
//! handler and the health check manager, and turns subtask failure counts
//! into a continue-or-abort recommendation.

use council_resilience::{
    CircuitBreaker, CircuitBreakerConfig, HealthCheckManager, HealthReport, HealthStatus,
    TimeoutHandler,
};
use std::sync::Arc;

pub struct ResilienceManager {
    pub analysis_breaker: Arc<CircuitBreaker>,
    pub decomposition_breaker: Arc<CircuitBreaker>,
    pub arbitration_breaker: Arc<CircuitBreaker>,
    pub synthesis_breaker: Arc<CircuitBreaker>,
    pub timeouts: Arc<TimeoutHandler>,
    health: parking_lot::Mutex<HealthCheckManager>,
    partial_failure_threshold: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialFailureOutcome {
    ContinueDegraded,
    Abort,
}

impl ResilienceManager {
    pub fn new(partial_failure_threshold: f64) -> Self {
        Self {
            analysis_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::analysis_engine())),
            decomposition_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::task_decomposer())),
            arbitration_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::arbitration_layer())),
            synthesis_breaker: Arc::new(CircuitBreaker::new(CircuitBreakerConfig::synthesis_layer())),
            timeouts: Arc::new(TimeoutHandler::default()),
            health: parking_lot::Mutex::new(HealthCheckManager::new()),
            partial_failure_threshold,
        }
    }

    /// `failed / total > threshold` aborts the request outright; at or
    /// below it the pipeline proceeds with whatever subset succeeded,
    /// degrading the final confidence rather than failing the request.
    pub fn evaluate_partial_failure(&self, failed: usize, total: usize) -> PartialFailureOutcome {
        if total == 0 {
            return PartialFailureOutcome::Abort;
        }
        let rate = failed as f64 / total as f64;
        if rate > self.partial_failure_threshold {
            PartialFailureOutcome::Abort
        } else {
            PartialFailureOutcome::ContinueDegraded
        }
    }

    pub fn record_component_health(&self, name: &str, status: HealthStatus, detail: Option<String>) {
        self.health.lock().report(name, status, detail);
    }

    pub fn overall_health(&self) -> HealthReport {
        self.health.lock().overall()
    }
}
