//! Per-operation adaptive timeouts driven by observed p95 latency.
//!
//! Each tracked key (typically a model id or subtask type) keeps a bounded
//! window of recent durations. The effective timeout is
//! `max(min_timeout, multiplier * p95)`, so a key that has been consistently
//! slow gets more headroom than one that has always been fast, without ever
//! dropping below the configured floor.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdaptiveTimeoutConfig {
    pub min_timeout_ms: u64,
    pub window_size: usize,
    pub multiplier: f64,
}

impl Default for AdaptiveTimeoutConfig {
    fn default() -> Self {
        Self {
            min_timeout_ms: 5_000,
            window_size: 50,
            multiplier: 1.5,
        }
    }
}

/// Tracks latency samples for a single key and derives a timeout from them.
pub struct AdaptiveTimeout {
    config: AdaptiveTimeoutConfig,
    samples: RwLock<VecDeque<u64>>,
}

impl AdaptiveTimeout {
    pub fn new(config: AdaptiveTimeoutConfig) -> Self {
        Self {
            config,
            samples: RwLock::new(VecDeque::with_capacity(config.window_size)),
        }
    }

    pub async fn record(&self, duration: Duration) {
        let mut samples = self.samples.write().await;
        if samples.len() >= self.config.window_size {
            samples.pop_front();
        }
        samples.push_back(duration.as_millis() as u64);
    }

    pub async fn current_timeout(&self) -> Duration {
        let samples = self.samples.read().await;
        if samples.is_empty() {
            return Duration::from_millis(self.config.min_timeout_ms);
        }

        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 * 0.95).ceil() as usize)
            .saturating_sub(1)
            .min(sorted.len() - 1);
        let p95 = sorted[idx] as f64;

        let adaptive_ms = (self.config.multiplier * p95) as u64;
        Duration::from_millis(adaptive_ms.max(self.config.min_timeout_ms))
    }
}

/// Outcome of a call run through [`TimeoutHandler::run`].
#[derive(Debug, thiserror::Error)]
pub enum TimeoutOutcome<E> {
    #[error("operation timed out")]
    TimedOut,
    #[error(transparent)]
    Failed(E),
}

/// Keeps one [`AdaptiveTimeout`] tracker per key and enforces it around a future.
pub struct TimeoutHandler {
    config: AdaptiveTimeoutConfig,
    trackers: DashMap<String, Arc<AdaptiveTimeout>>,
}

impl TimeoutHandler {
    pub fn new(config: AdaptiveTimeoutConfig) -> Self {
        Self {
            config,
            trackers: DashMap::new(),
        }
    }

    fn tracker_for(&self, key: &str) -> Arc<AdaptiveTimeout> {
        self.trackers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AdaptiveTimeout::new(self.config.clone())))
            .clone()
    }

    pub async fn timeout_for(&self, key: &str) -> Duration {
        self.tracker_for(key).current_timeout().await
    }

    /// Run `operation` under the adaptive timeout for `key`, recording the
    /// elapsed time on completion (whether it succeeded, failed, or timed out
    /// no longer holds — only completed calls feed the rolling window).
    pub async fn run<F, Fut, T, E>(&self, key: &str, operation: F) -> Result<T, TimeoutOutcome<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let tracker = self.tracker_for(key);
        let deadline = tracker.current_timeout().await;
        let start = std::time::Instant::now();

        match tokio::time::timeout(deadline, operation()).await {
            Ok(Ok(value)) => {
                tracker.record(start.elapsed()).await;
                Ok(value)
            }
            Ok(Err(error)) => {
                tracker.record(start.elapsed()).await;
                Err(TimeoutOutcome::Failed(error))
            }
            Err(_) => Err(TimeoutOutcome::TimedOut),
        }
    }
}

impl Default for TimeoutHandler {
    fn default() -> Self {
        Self::new(AdaptiveTimeoutConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_window_uses_floor() {
        let at = AdaptiveTimeout::new(AdaptiveTimeoutConfig {
            min_timeout_ms: 2_000,
            ..Default::default()
        });
        assert_eq!(at.current_timeout().await, Duration::from_millis(2_000));
    }

    #[tokio::test]
    async fn timeout_tracks_p95_above_floor() {
        let at = AdaptiveTimeout::new(AdaptiveTimeoutConfig {
            min_timeout_ms: 100,
            window_size: 10,
            multiplier: 1.5,
        });
        for ms in [100, 100, 100, 100, 100, 100, 100, 100, 100, 1000] {
            at.record(Duration::from_millis(ms)).await;
        }
        // p95 of this window is the 1000ms sample; 1.5x that clears the floor.
        assert!(at.current_timeout().await > Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn run_times_out_without_recording() {
        let handler = TimeoutHandler::new(AdaptiveTimeoutConfig {
            min_timeout_ms: 10,
            ..Default::default()
        });
        let result = handler
            .run("model-a", || async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(result, Err(TimeoutOutcome::TimedOut)));
    }
}
