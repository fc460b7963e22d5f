//! Circuit breaker pattern.
//!
//! States:
//! - Closed: normal operation.
//! - Open: failing, reject calls until `reset_timeout` elapses.
//! - HalfOpen: probing whether the dependency recovered.
//!
//! `execute` never mixes "the circuit rejected the call" with "the call
//! itself failed" into a single error type: callers match on
//! [`CircuitCallError::Open`] vs [`CircuitCallError::Failed`] rather than
//! downcasting an exception, so a stage's fallback logic can tell the two
//! apart without guessing.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub name: String,
    pub failure_threshold: u64,
    pub success_threshold: u64,
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>, failure_threshold: u64, reset_timeout_ms: u64, success_threshold: u64) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            success_threshold,
            reset_timeout_ms,
        }
    }

    /// Defaults for the analysis stage: 3 failures / 30s recovery / 2 probe successes.
    pub fn analysis_engine() -> Self {
        Self::new("analysis_engine", 3, 30_000, 2)
    }

    /// Defaults for task decomposition: 3 failures / 45s recovery / 2 probe successes.
    pub fn task_decomposer() -> Self {
        Self::new("task_decomposer", 3, 45_000, 2)
    }

    /// Defaults for arbitration: 5 failures / 60s recovery / 3 probe successes.
    pub fn arbitration_layer() -> Self {
        Self::new("arbitration_layer", 5, 60_000, 3)
    }

    /// Defaults for synthesis: 3 failures / 30s recovery / 2 probe successes.
    pub fn synthesis_layer() -> Self {
        Self::new("synthesis_layer", 3, 30_000, 2)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub total_requests: u64,
    pub last_failure: Option<SystemTime>,
    pub last_success: Option<SystemTime>,
}

/// The outcome of a circuit-protected call, kept distinct from the
/// operation's own error type so a rejected call can never be mistaken
/// for a genuine failure of the wrapped operation.
#[derive(Debug, thiserror::Error)]
pub enum CircuitCallError<E> {
    #[error("circuit breaker '{name}' is open")]
    Open {
        name: String,
        stats: CircuitBreakerStats,
    },
    #[error(transparent)]
    Failed(E),
}

impl<E> CircuitCallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CircuitCallError::Open { .. })
    }
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU64,
    success_count: AtomicU64,
    total_requests: AtomicU64,
    next_attempt: Arc<RwLock<Instant>>,
    last_failure: Arc<RwLock<Option<SystemTime>>>,
    last_success: Arc<RwLock<Option<SystemTime>>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            next_attempt: Arc::new(RwLock::new(Instant::now())),
            last_failure: Arc::new(RwLock::new(None)),
            last_success: Arc::new(RwLock::new(None)),
            state: AtomicU8::new(0),
            failure_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            total_requests: AtomicU64::new(0),
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Run `operation` under circuit protection. Returns
    /// `CircuitCallError::Open` without invoking `operation` at all if the
    /// breaker is currently open and the reset timeout hasn't elapsed yet.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitCallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        if self.get_state() == CircuitState::Open {
            let next_attempt = *self.next_attempt.read().await;
            if Instant::now() < next_attempt {
                return Err(CircuitCallError::Open {
                    name: self.config.name.clone(),
                    stats: self.get_stats().await,
                });
            }
            self.state.store(2, Ordering::Relaxed);
            self.success_count.store(0, Ordering::Relaxed);
        }

        match operation().await {
            Ok(value) => {
                self.on_success().await;
                Ok(value)
            }
            Err(error) => {
                self.on_failure().await;
                Err(CircuitCallError::Failed(error))
            }
        }
    }

    async fn on_success(&self) {
        *self.last_success.write().await = Some(SystemTime::now());

        if self.get_state() == CircuitState::HalfOpen {
            let success_count = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if success_count >= self.config.success_threshold {
                self.state.store(0, Ordering::Relaxed);
                self.success_count.store(0, Ordering::Relaxed);
                self.failure_count.store(0, Ordering::Relaxed);
                info!(breaker = %self.config.name, "circuit closed after {} probe successes", success_count);
            }
        } else {
            self.failure_count.store(0, Ordering::Relaxed);
        }
    }

    async fn on_failure(&self) {
        *self.last_failure.write().await = Some(SystemTime::now());

        if self.get_state() == CircuitState::HalfOpen {
            self.open().await;
            return;
        }

        let failure_count = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        if failure_count >= self.config.failure_threshold {
            self.open().await;
        }
    }

    async fn open(&self) {
        self.state.store(1, Ordering::Relaxed);
        let next_attempt = Instant::now() + Duration::from_millis(self.config.reset_timeout_ms);
        *self.next_attempt.write().await = next_attempt;
        self.success_count.store(0, Ordering::Relaxed);
        warn!(breaker = %self.config.name, "circuit opened");
    }

    pub fn get_state(&self) -> CircuitState {
        match self.state.load(Ordering::Relaxed) {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        CircuitBreakerStats {
            state: self.get_state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            last_failure: *self.last_failure.read().await,
            last_success: *self.last_success.read().await,
        }
    }

    pub async fn reset(&self) {
        self.state.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        *self.last_failure.write().await = None;
        *self.last_success.write().await = None;
    }

    pub async fn force_open(&self) {
        self.open().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_closed() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::analysis_engine());
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_at_exactly_the_failure_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new("t", 3, 30_000, 2));

        for _ in 0..2 {
            let result = cb.execute(|| async { Err::<(), &str>("boom") }).await;
            assert!(matches!(result, Err(CircuitCallError::Failed(_))));
            assert_eq!(cb.get_state(), CircuitState::Closed);
        }

        let result = cb.execute(|| async { Err::<(), &str>("boom") }).await;
        assert!(matches!(result, Err(CircuitCallError::Failed(_))));
        assert_eq!(cb.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn open_breaker_rejects_without_calling_operation() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new("t", 1, 60_000, 1));
        cb.force_open().await;

        let mut called = false;
        let result = cb
            .execute(|| {
                called = true;
                async { Ok::<_, &str>(1) }
            })
            .await;

        assert!(!called);
        assert!(matches!(result, Err(CircuitCallError::Open { .. })));
    }

    #[tokio::test]
    async fn half_open_failure_reopens_immediately() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::new("t", 1, 0, 2));
        cb.force_open().await;
        // reset_timeout_ms = 0 so the next call immediately probes half-open.
        let result = cb.execute(|| async { Err::<(), &str>("still broken") }).await;
        assert!(matches!(result, Err(CircuitCallError::Failed(_))));
        assert_eq!(cb.get_state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn reset_returns_to_closed() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::analysis_engine());
        cb.force_open().await;
        assert_eq!(cb.get_state(), CircuitState::Open);
        cb.reset().await;
        assert_eq!(cb.get_state(), CircuitState::Closed);
    }
}
