//! The top-level pipeline: analysis → decomposition → routing → execution
//! → partial-failure check → arbitration → synthesis → metadata, with
//! events published on the bus alongside each stage transition.

use crate::analysis::AnalysisEngine;
use crate::arbitration::{ArbitrationLayer, ConfidenceDivergence};
use crate::cost::{Candidate, CostOptimizer};
use crate::cost_discrepancy;
use crate::decomposition::TaskDecomposer;
use crate::event_bus::EventBus;
use crate::execution::{should_stop_early, ExecutionAgent};
use crate::resilience_manager::{PartialFailureOutcome, ResilienceManager};
use crate::router::Router;
use crate::synthesis::SynthesisLayer;
use council_config::CoreConfig;
use council_contracts::events::{EventEnvelope, ExecutionStatus, RoutingAssignment, StageEvent, SynthesisStage};
use council_contracts::{
    AgentResponse, ArbitrationResult, Complexity, CostBreakdown, ExecutionMetadata, ExecutionMode, FinalResponse,
    Intent, ModelRegistry, OrchestrationError, Subtask, Task, TaskType,
};
use council_resilience::structured_logging::request_span;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn, Instrument};
use uuid::Uuid;

/// The routing stage found no usable model for this subtask — reported as a
/// failed response rather than dropped, so it still counts toward partial
/// failure and still gets an `execution_progress` event.
fn no_model_available_response(subtask: &Subtask) -> AgentResponse {
    AgentResponse {
        subtask_id: subtask.id,
        model_used: "none_available".to_string(),
        content: String::new(),
        self_assessment: None,
        success: false,
        error_message: Some(format!("No models available for task type {:?}", subtask.task_type)),
        metadata: Default::default(),
    }
}

pub struct Orchestrator {
    config: CoreConfig,
    analysis: AnalysisEngine,
    decomposer: TaskDecomposer,
    router: Router,
    cost_optimizer: CostOptimizer,
    arbitration: ArbitrationLayer,
    synthesis: SynthesisLayer,
    resilience: Arc<ResilienceManager>,
    registry: Arc<ModelRegistry>,
    concurrency: Arc<Semaphore>,
    pub events: Arc<EventBus>,
}

impl Orchestrator {
    pub fn new(config: CoreConfig, registry: Arc<ModelRegistry>) -> Self {
        let resilience = Arc::new(ResilienceManager::new(config.partial_failure_threshold));
        let concurrency = Arc::new(Semaphore::new(config.execution.max_parallel_executions as usize));
        Self {
            router: Router::new(registry.clone()),
            analysis: AnalysisEngine::new(),
            decomposer: TaskDecomposer::new(),
            cost_optimizer: CostOptimizer::new(),
            arbitration: ArbitrationLayer::new(Box::new(ConfidenceDivergence::default()), 0.2),
            synthesis: SynthesisLayer::new(),
            resilience,
            registry,
            concurrency,
            events: Arc::new(EventBus::new()),
            config,
        }
    }

    /// Runs the pipeline under the configured overall request deadline.
    /// Breaching it cancels every still-running worker cooperatively and
    /// discards whatever they were computing: the caller only ever sees a
    /// degraded [`FinalResponse`], never a hung request.
    pub async fn process_request(&self, content: String, execution_mode: ExecutionMode) -> FinalResponse {
        let request_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let deadline = Duration::from_secs_f64(self.config.execution.default_timeout_seconds.max(0.001));

        match tokio::time::timeout(deadline, self.run_pipeline(request_id, content, execution_mode, cancel.clone()))
            .await
        {
            Ok(response) => response,
            Err(_) => {
                cancel.cancel();
                warn!(%request_id, "request exceeded its overall deadline, cancelling outstanding work");
                self.publish(
                    request_id,
                    StageEvent::Error {
                        message: format!(
                            "request exceeded the {}s deadline",
                            self.config.execution.default_timeout_seconds
                        ),
                    },
                )
                .await;
                self.events.close_request(request_id);
                FinalResponse::degraded(String::new(), "request timed out")
            }
        }
    }

    #[instrument(skip(self, content, cancel))]
    async fn run_pipeline(
        &self,
        request_id: Uuid,
        content: String,
        execution_mode: ExecutionMode,
        cancel: CancellationToken,
    ) -> FinalResponse {
        let started = Instant::now();
        let mut execution_path = Vec::new();

        self.publish(request_id, StageEvent::ProcessingStarted { execution_mode }).await;

        let (intent, complexity) = match self
            .run_analysis(&content)
            .instrument(request_span(request_id, "analysis"))
            .await
        {
            Ok(result) => result,
            Err(error) => return self.fail(request_id, &error).await,
        };
        execution_path.push("task_creation".to_string());
        self.publish(request_id, StageEvent::AnalysisComplete { intent, complexity }).await;

        let task = Task {
            id: request_id,
            content,
            intent,
            complexity,
            execution_mode,
            created_at: chrono::Utc::now(),
        };

        let subtasks = self
            .run_decomposition(request_id, &task)
            .instrument(request_span(request_id, "decomposition"))
            .await;
        execution_path.push("task_decomposition".to_string());

        let plan = self.router.determine_parallelism(&subtasks);
        let (assignments, agents, mut unrouted_responses) = self
            .assign_models(&subtasks, execution_mode)
            .instrument(request_span(request_id, "routing"))
            .await;

        let total_estimated: f64 = assignments.iter().map(|a| a.estimated_cost).sum();
        info!(%request_id, total_estimated, "pre-flight cost estimate");
        if execution_mode != ExecutionMode::Fast && total_estimated > self.config.cost.max_cost_per_request {
            let error = OrchestrationError::Validation(format!(
                "pre-flight cost estimate {total_estimated:.4} exceeds the {:.4} budget",
                self.config.cost.max_cost_per_request
            ));
            return self.fail(request_id, &error).await;
        }

        self.publish(
            request_id,
            StageEvent::RoutingComplete {
                assignments,
                total_subtasks: subtasks.len(),
            },
        )
        .await;
        execution_path.push("execution_planning".to_string());

        let mut responses = self
            .run_execution(request_id, &plan, agents, execution_mode, cancel)
            .instrument(request_span(request_id, "execution"))
            .await;
        execution_path.push("subtask_execution".to_string());

        for response in &unrouted_responses {
            self.publish_execution_progress(request_id, response).await;
        }
        responses.append(&mut unrouted_responses);

        let failed = responses.iter().filter(|r| !r.success).count();
        match self.resilience.evaluate_partial_failure(failed, responses.len()) {
            PartialFailureOutcome::Abort => {
                let error = OrchestrationError::PartialFailure {
                    failed,
                    total: responses.len(),
                };
                return self.fail(request_id, &error).await;
            }
            PartialFailureOutcome::ContinueDegraded if failed > 0 => {
                execution_path.push("partial_failure_degraded".to_string());
            }
            PartialFailureOutcome::ContinueDegraded => {}
        }

        let arbitration_result = if self.config.execution.enable_arbitration {
            self.run_arbitration(request_id, responses)
                .instrument(request_span(request_id, "arbitration"))
                .await
        } else {
            self.bypass_arbitration(request_id, responses)
                .instrument(request_span(request_id, "arbitration"))
                .await
        };
        execution_path.push("arbitration".to_string());

        let total_elapsed_ms = started.elapsed().as_millis() as u64;
        let final_response = if self.config.execution.enable_synthesis {
            self.publish(
                request_id,
                StageEvent::SynthesisProgress {
                    stage: SynthesisStage::Started,
                    content: None,
                    overall_confidence: None,
                    success: None,
                    models_used: None,
                    cost_breakdown: None,
                    execution_metadata: None,
                },
            )
            .await;

            let response = self
                .run_synthesis(
                    request_id,
                    &arbitration_result.validated_responses,
                    &subtasks,
                    execution_path.clone(),
                    total_elapsed_ms,
                    plan.parallel_groups.len(),
                )
                .instrument(request_span(request_id, "synthesis"))
                .await;
            execution_path.push("synthesis".to_string());

            self.publish(
                request_id,
                StageEvent::SynthesisProgress {
                    stage: SynthesisStage::Complete,
                    content: Some(response.content.clone()),
                    overall_confidence: Some(response.overall_confidence),
                    success: Some(response.success),
                    models_used: Some(response.models_used.clone()),
                    cost_breakdown: Some(response.cost_breakdown.clone()),
                    execution_metadata: Some(response.execution_metadata.clone()),
                },
            )
            .await;
            response
        } else {
            self.first_validated_as_final(
                &arbitration_result.validated_responses,
                execution_path.clone(),
                total_elapsed_ms,
                plan.parallel_groups.len(),
            )
        };

        self.publish(
            request_id,
            StageEvent::FinalResponse {
                content: final_response.content.clone(),
                overall_confidence: final_response.overall_confidence,
                success: final_response.success,
                models_used: final_response.models_used.clone(),
                cost_breakdown: final_response.cost_breakdown.clone(),
                execution_metadata: final_response.execution_metadata.clone(),
                error_message: final_response.error_message.clone(),
            },
        )
        .await;

        if final_response.success {
            cost_discrepancy::check_and_log(
                request_id,
                &format!("{execution_mode:?}"),
                total_estimated,
                final_response.cost_breakdown.total_cost,
            );
        }

        self.events.close_request(request_id);
        final_response
    }

    async fn run_analysis(&self, content: &str) -> Result<(Intent, Complexity), OrchestrationError> {
        self.resilience
            .analysis_breaker
            .execute(|| async {
                let intent = self.analysis.analyze_intent(content).map_err(|e| e.to_string())?;
                let complexity = self.analysis.determine_complexity(content).map_err(|e| e.to_string())?;
                Ok::<_, String>((intent, complexity))
            })
            .await
            .map_err(|e| match e {
                council_resilience::CircuitCallError::Open { .. } => OrchestrationError::CircuitOpen {
                    component: "analysis_engine".to_string(),
                },
                council_resilience::CircuitCallError::Failed(message) => OrchestrationError::Analysis(message),
            })
    }

    async fn run_decomposition(&self, request_id: Uuid, task: &Task) -> Vec<Subtask> {
        let result = self
            .resilience
            .decomposition_breaker
            .execute(|| async {
                let subtasks = self.decomposer.decompose(task);
                self.decomposer
                    .validate_decomposition(&subtasks)
                    .map(|_| subtasks)
                    .map_err(|e| e.to_string())
            })
            .await;

        match result {
            Ok(subtasks) => subtasks,
            Err(error) => {
                warn!(
                    %request_id,
                    kind = OrchestrationError::Decomposition(String::new()).kind_label(),
                    error = %error,
                    "decomposition breaker tripped, falling back to a single reasoning subtask"
                );
                TaskDecomposer::fallback(task)
            }
        }
    }

    /// Routes every subtask to a model, or — when no candidate model serves
    /// its task type, or the optimizer's pick can't be found again in the
    /// candidate list — produces a failed [`AgentResponse`] for it directly
    /// so it's never silently dropped from downstream counts.
    async fn assign_models(
        &self,
        subtasks: &[Subtask],
        execution_mode: ExecutionMode,
    ) -> (Vec<RoutingAssignment>, Vec<(Subtask, ExecutionAgent)>, Vec<AgentResponse>) {
        let mut assignments = Vec::new();
        let mut agents = Vec::new();
        let mut unrouted = Vec::new();

        for subtask in subtasks {
            let candidates = self.registry.get_models_for_task_type(subtask.task_type).await;
            let borrowed: Vec<Candidate<'_>> = candidates
                .iter()
                .map(|(model, caps)| Candidate {
                    model_id: model.get_model_id(),
                    capabilities: caps,
                    prompt_len_chars: subtask.content.len(),
                })
                .collect();

            let decision = match self.cost_optimizer.optimize_model_selection(execution_mode, &borrowed) {
                Ok(decision) => decision,
                Err(_) => {
                    unrouted.push(no_model_available_response(subtask));
                    continue;
                }
            };

            match candidates
                .into_iter()
                .find(|(model, _)| model.get_model_id() == decision.recommended_model)
            {
                Some((model, _)) => {
                    assignments.push(RoutingAssignment {
                        subtask_id: subtask.id,
                        task_type: format!("{:?}", subtask.task_type),
                        model_id: decision.recommended_model.clone(),
                        reason: decision.reasoning.clone(),
                        estimated_cost: decision.estimated_cost,
                        estimated_time_ms: decision.estimated_time_ms as u64,
                    });
                    agents.push((subtask.clone(), ExecutionAgent::new(model)));
                }
                None => unrouted.push(no_model_available_response(subtask)),
            }
        }

        (assignments, agents, unrouted)
    }

    /// Runs every parallel group in order, bounding total concurrent workers
    /// across all groups to `execution.max_parallel_executions`. Each worker
    /// races the adaptive per-subtask timeout against the shared
    /// cancellation token, so a request-deadline breach discards it
    /// cooperatively instead of leaving it running unobserved.
    async fn run_execution(
        &self,
        request_id: Uuid,
        plan: &council_contracts::ExecutionPlan,
        agents: Vec<(Subtask, ExecutionAgent)>,
        execution_mode: ExecutionMode,
        cancel: CancellationToken,
    ) -> Vec<AgentResponse> {
        let by_id: HashMap<Uuid, (Subtask, Arc<ExecutionAgent>)> =
            agents.into_iter().map(|(s, a)| (s.id, (s, Arc::new(a)))).collect();

        let mut responses = Vec::with_capacity(by_id.len());
        let mut failed_groups = 0usize;

        for (group_index, group) in plan.parallel_groups.iter().enumerate() {
            let mut handles = Vec::new();
            for id in group {
                let Some((subtask, agent)) = by_id.get(id).cloned() else {
                    continue;
                };
                let resilience = self.resilience.clone();
                let cancel = cancel.clone();
                let permit = self.concurrency.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.ok();
                    let key = agent.model_id().to_string();
                    tokio::select! {
                        _ = cancel.cancelled() => AgentResponse {
                            subtask_id: subtask.id,
                            model_used: key,
                            content: String::new(),
                            self_assessment: None,
                            success: false,
                            error_message: Some("execution cancelled: request deadline exceeded".to_string()),
                            metadata: HashMap::from([("cancelled".to_string(), serde_json::Value::Bool(true))]),
                        },
                        outcome = resilience.timeouts.run(&key, || async { Ok::<_, String>(agent.execute(&subtask).await) }) => {
                            match outcome {
                                Ok(response) => response,
                                Err(_) => AgentResponse {
                                    subtask_id: subtask.id,
                                    model_used: key,
                                    content: String::new(),
                                    self_assessment: None,
                                    success: false,
                                    error_message: Some("Execution timed out".to_string()),
                                    metadata: Default::default(),
                                },
                            }
                        }
                    }
                }));
            }

            let group_responses: Vec<AgentResponse> = futures::future::join_all(handles)
                .await
                .into_iter()
                .filter_map(|joined| joined.ok())
                .collect();

            for response in &group_responses {
                self.publish_execution_progress(request_id, response).await;
                if response.success {
                    self.cost_optimizer
                        .record_success(&response.model_used, response.estimated_cost(), response.confidence());
                }
            }

            if group_responses.iter().any(|r| !r.success) {
                failed_groups += 1;
            }
            responses.extend(group_responses);

            if execution_mode == ExecutionMode::Fast && should_stop_early(failed_groups, group_index) {
                info!(%request_id, "stopping early: failure rate past threshold in fast mode");
                break;
            }
        }

        responses
    }

    async fn publish_execution_progress(&self, request_id: Uuid, response: &AgentResponse) {
        self.publish(
            request_id,
            StageEvent::ExecutionProgress {
                subtask_id: response.subtask_id,
                model_id: response.model_used.clone(),
                status: if response.success { ExecutionStatus::Completed } else { ExecutionStatus::Failed },
                confidence: response.confidence(),
                cost: response.estimated_cost(),
                execution_time_ms: response
                    .self_assessment
                    .as_ref()
                    .map(|a| a.execution_time_ms)
                    .unwrap_or(0),
                success: response.success,
                error_message: response.error_message.clone(),
            },
        )
        .await;
    }

    async fn run_arbitration(&self, request_id: Uuid, responses: Vec<AgentResponse>) -> ArbitrationResult {
        let result = self
            .resilience
            .arbitration_breaker
            .execute(|| {
                let responses = responses.clone();
                async move { Ok::<_, String>(self.arbitration.arbitrate(responses)) }
            })
            .await;

        let result = result.unwrap_or_else(|_| ArbitrationResult {
            validated_responses: responses,
            conflicts_resolved: Vec::new(),
        });

        self.publish(
            request_id,
            StageEvent::ArbitrationDecision {
                conflicts_detected: result.conflicts_resolved.len(),
                decisions: result.conflicts_resolved.clone(),
                conflicting_results: result
                    .validated_responses
                    .iter()
                    .map(|r| r.subtask_id)
                    .collect(),
            },
        )
        .await;

        result
    }

    /// When arbitration is disabled by configuration, the first successful
    /// response stands in for the whole subtask and nothing is reported as
    /// a conflict.
    async fn bypass_arbitration(&self, request_id: Uuid, responses: Vec<AgentResponse>) -> ArbitrationResult {
        let validated: Vec<AgentResponse> = responses.into_iter().find(|r| r.success).into_iter().collect();
        let result = ArbitrationResult {
            validated_responses: validated,
            conflicts_resolved: Vec::new(),
        };

        self.publish(
            request_id,
            StageEvent::ArbitrationDecision {
                conflicts_detected: 0,
                decisions: Vec::new(),
                conflicting_results: result.validated_responses.iter().map(|r| r.subtask_id).collect(),
            },
        )
        .await;

        result
    }

    /// Runs synthesis through its breaker. A breaker-open or synthesis
    /// failure with at least one validated response degrades to returning
    /// that response's content verbatim; with none, synthesis never even
    /// had material to work with.
    async fn run_synthesis(
        &self,
        request_id: Uuid,
        responses: &[AgentResponse],
        subtasks: &[Subtask],
        execution_path: Vec<String>,
        total_execution_time_ms: u64,
        parallel_executions: usize,
    ) -> FinalResponse {
        if responses.is_empty() {
            return FinalResponse {
                content: String::new(),
                overall_confidence: 0.0,
                success: false,
                error_message: Some("No responses available for synthesis".to_string()),
                models_used: Vec::new(),
                cost_breakdown: CostBreakdown::default(),
                execution_metadata: ExecutionMetadata {
                    execution_path,
                    total_execution_time_ms,
                    parallel_executions,
                },
            };
        }

        let path_for_breaker = execution_path.clone();
        let currency = self.config.cost.currency.clone();
        let result = self
            .resilience
            .synthesis_breaker
            .execute(|| async {
                Ok::<_, String>(self.synthesis.synthesize(
                    responses,
                    subtasks,
                    path_for_breaker,
                    total_execution_time_ms,
                    parallel_executions,
                    &currency,
                ))
            })
            .await;

        match result {
            Ok(final_response) => final_response,
            Err(error) => {
                warn!(
                    %request_id,
                    kind = OrchestrationError::Synthesis(String::new()).kind_label(),
                    error = %error,
                    "synthesis breaker tripped, falling back to the first validated response"
                );
                self.first_validated_as_final(responses, execution_path, total_execution_time_ms, parallel_executions)
            }
        }
    }

    /// Degraded stand-in for synthesis: the first validated response's
    /// content verbatim, used both when synthesis is disabled by
    /// configuration and when the synthesis breaker trips.
    fn first_validated_as_final(
        &self,
        responses: &[AgentResponse],
        execution_path: Vec<String>,
        total_execution_time_ms: u64,
        parallel_executions: usize,
    ) -> FinalResponse {
        let Some(first) = responses.first() else {
            return FinalResponse {
                content: String::new(),
                overall_confidence: 0.0,
                success: false,
                error_message: Some("No responses available for synthesis".to_string()),
                models_used: Vec::new(),
                cost_breakdown: CostBreakdown::default(),
                execution_metadata: ExecutionMetadata {
                    execution_path,
                    total_execution_time_ms,
                    parallel_executions,
                },
            };
        };

        FinalResponse {
            content: first.content.clone(),
            overall_confidence: first.confidence(),
            success: true,
            error_message: None,
            models_used: vec![first.model_used.clone()],
            cost_breakdown: CostBreakdown {
                total_cost: first.estimated_cost(),
                execution_time_ms: total_execution_time_ms,
                model_costs: HashMap::from([(first.model_used.clone(), first.estimated_cost())]),
                token_usage: HashMap::new(),
                currency: self.config.cost.currency.clone(),
            },
            execution_metadata: ExecutionMetadata {
                execution_path,
                total_execution_time_ms,
                parallel_executions,
            },
        }
    }

    async fn fail(&self, request_id: Uuid, error: &OrchestrationError) -> FinalResponse {
        warn!(%request_id, kind = error.kind_label(), error = %error, "pipeline stage failed, returning a degraded response");
        self.publish(
            request_id,
            StageEvent::Error {
                message: error.to_string(),
            },
        )
        .await;
        self.events.close_request(request_id);
        FinalResponse::degraded(String::new(), error.to_string())
    }

    async fn publish(&self, request_id: Uuid, event: StageEvent) {
        self.events.publish(EventEnvelope::new(request_id, event)).await;
    }
}
