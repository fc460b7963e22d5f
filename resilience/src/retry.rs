//! Exponential backoff retry with jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("max retry attempts ({attempts}) exceeded")]
    MaxAttemptsExceeded { attempts: u32, last_error: E },
}

impl<E> RetryError<E> {
    pub fn into_last_error(self) -> E {
        match self {
            RetryError::MaxAttemptsExceeded { last_error, .. } => last_error,
        }
    }
}

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        error!(attempts = attempt, "retry attempts exhausted");
                        return Err(RetryError::MaxAttemptsExceeded {
                            attempts: attempt,
                            last_error: error,
                        });
                    }

                    let delay_ms = self.calculate_delay(attempt);
                    warn!(attempt, delay_ms, "operation failed, retrying");
                    sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }

    fn calculate_delay(&self, attempt: u32) -> u64 {
        let mut delay_ms =
            self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(attempt as i32 - 1);
        delay_ms = delay_ms.min(self.config.max_delay_ms as f64);

        if self.config.jitter_factor > 0.0 {
            let jitter_range = (delay_ms * self.config.jitter_factor) as u64;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range.max(1));
            delay_ms -= jitter as f64;
        }

        delay_ms.max(0.0) as u64
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_on_first_attempt() {
        let executor = RetryExecutor::new(RetryConfig::default());
        let result = executor.execute(|| async { Ok::<i32, &str>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            ..Default::default()
        });
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result = executor
            .execute(move || {
                let attempts = attempts_clone.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::Relaxed) < 2 {
                        Err::<i32, &str>("transient")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            ..Default::default()
        });
        let result = executor.execute(|| async { Err::<i32, &str>("nope") }).await;
        match result.unwrap_err() {
            RetryError::MaxAttemptsExceeded { attempts, .. } => assert_eq!(attempts, 2),
        }
    }

    #[test]
    fn delay_grows_exponentially_without_jitter() {
        let executor = RetryExecutor::new(RetryConfig {
            initial_delay_ms: 100,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts: 5,
        });
        assert_eq!(executor.calculate_delay(1), 100);
        assert_eq!(executor.calculate_delay(2), 200);
        assert_eq!(executor.calculate_delay(3), 400);
    }
}
