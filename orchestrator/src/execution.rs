//! Runs subtasks against models and always produces an [`AgentResponse`],
//! successful or not — this stage never propagates an error to its caller,
//! it converts every failure into a response marked `success: false`.

use council_contracts::{AgentResponse, Model, ModelCallError, RiskLevel, SelfAssessment, Subtask};
use council_resilience::{RetryConfig, RetryExecutor};
use std::sync::Arc;
use std::time::Instant;

pub struct ExecutionAgent {
    model: Arc<dyn Model>,
    retry: RetryExecutor,
}

impl ExecutionAgent {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            retry: RetryExecutor::new(RetryConfig::default()),
        }
    }

    pub fn model_id(&self) -> &str {
        self.model.get_model_id()
    }

    /// Rate-limit responses are retried with backoff; every other error
    /// kind surfaces on the first attempt, since retrying a bad prompt or
    /// an authentication failure wouldn't change the outcome.
    pub async fn execute(&self, subtask: &Subtask) -> AgentResponse {
        let started = Instant::now();

        let result = match self.call_model(subtask).await {
            Err(ModelCallError::RateLimit(_)) => self
                .retry
                .execute(|| self.call_model(subtask))
                .await
                .map_err(|e| e.into_last_error()),
            other => other,
        };

        match result {
            Ok(content) => {
                let elapsed = started.elapsed();
                AgentResponse {
                    subtask_id: subtask.id,
                    model_used: self.model.get_model_id().to_string(),
                    content,
                    self_assessment: Some(SelfAssessment {
                        confidence: 0.8,
                        assumptions: Vec::new(),
                        risk_level: RiskLevel::Low,
                        estimated_cost: 0.0,
                        token_usage: 0,
                        execution_time_ms: elapsed.as_millis() as u64,
                        model_used: self.model.get_model_id().to_string(),
                    }),
                    success: true,
                    error_message: None,
                    metadata: Default::default(),
                }
            }
            Err(err) => self.failed_response(subtask, started.elapsed().as_millis() as u64, &err),
        }
    }

    async fn call_model(&self, subtask: &Subtask) -> Result<String, ModelCallError> {
        let options = council_contracts::model::GenerateOptions::default();
        self.model.generate(&subtask.content, options).await
    }

    fn failed_response(&self, subtask: &Subtask, elapsed_ms: u64, err: &ModelCallError) -> AgentResponse {
        AgentResponse {
            subtask_id: subtask.id,
            model_used: self.model.get_model_id().to_string(),
            content: String::new(),
            self_assessment: Some(SelfAssessment {
                confidence: 0.0,
                assumptions: Vec::new(),
                risk_level: RiskLevel::High,
                estimated_cost: 0.0,
                token_usage: 0,
                execution_time_ms: elapsed_ms,
                model_used: self.model.get_model_id().to_string(),
            }),
            success: false,
            error_message: Some(err.to_string()),
            metadata: Default::default(),
        }
    }
}

/// `failed_groups / (group_index + 1) > 0.5`, evaluated after each group in
/// FAST mode; once true, remaining groups are skipped and already-collected
/// responses move straight to arbitration.
pub fn should_stop_early(failed_groups: usize, group_index: usize) -> bool {
    (failed_groups as f64) / ((group_index + 1) as f64) > 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use council_contracts::model::GenerateOptions;
    use council_contracts::{Priority, TaskType};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    struct AlwaysOk;
    #[async_trait]
    impl Model for AlwaysOk {
        fn get_model_id(&self) -> &str {
            "ok-model"
        }
        async fn generate(&self, prompt: &str, _options: GenerateOptions) -> Result<String, ModelCallError> {
            Ok(format!("echo: {prompt}"))
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Model for AlwaysFails {
        fn get_model_id(&self) -> &str {
            "bad-model"
        }
        async fn generate(&self, _prompt: &str, _options: GenerateOptions) -> Result<String, ModelCallError> {
            Err(ModelCallError::Provider("boom".into()))
        }
    }

    struct RateLimitedOnce(AtomicU32);
    #[async_trait]
    impl Model for RateLimitedOnce {
        fn get_model_id(&self) -> &str {
            "flaky-model"
        }
        async fn generate(&self, prompt: &str, _options: GenerateOptions) -> Result<String, ModelCallError> {
            if self.0.fetch_add(1, Ordering::Relaxed) == 0 {
                Err(ModelCallError::RateLimit("slow down".into()))
            } else {
                Ok(format!("retried: {prompt}"))
            }
        }
    }

    fn subtask() -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            parent_task_id: Uuid::new_v4(),
            content: "hello".into(),
            task_type: TaskType::Reasoning,
            priority: Priority::Medium,
            accuracy_requirement: 0.7,
        }
    }

    #[tokio::test]
    async fn successful_generation_yields_success_response() {
        let agent = ExecutionAgent::new(Arc::new(AlwaysOk));
        let response = agent.execute(&subtask()).await;
        assert!(response.success);
        assert_eq!(response.content, "echo: hello");
    }

    #[tokio::test]
    async fn failed_generation_never_panics_and_marks_failure() {
        let agent = ExecutionAgent::new(Arc::new(AlwaysFails));
        let response = agent.execute(&subtask()).await;
        assert!(!response.success);
        assert!(response.error_message.is_some());
    }

    #[tokio::test]
    async fn rate_limited_call_recovers_on_retry() {
        let agent = ExecutionAgent::new(Arc::new(RateLimitedOnce(AtomicU32::new(0))));
        let response = agent.execute(&subtask()).await;
        assert!(response.success);
        assert_eq!(response.content, "retried: hello");
    }

    #[test]
    fn early_stop_triggers_past_half_failure_rate() {
        assert!(!should_stop_early(1, 2)); // 1/2
        assert!(should_stop_early(2, 2)); // 2/3 > 0.5
    }
}
