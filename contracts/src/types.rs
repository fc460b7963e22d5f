//! Shared data model: the entities that flow between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionMode {
    Fast,
    Balanced,
    BestQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Informational,
    Generative,
    Analytical,
    Conversational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Reasoning,
    Research,
    CodeGeneration,
    FactChecking,
    Debugging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Numeric weight used when a weighted mean needs a plain number —
    /// e.g. synthesis confidence weighting by subtask priority.
    pub fn weight(&self) -> f64 {
        match self {
            Priority::Low => 1.0,
            Priority::Medium => 2.0,
            Priority::High => 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub content: String,
    pub intent: Intent,
    pub complexity: Complexity,
    pub execution_mode: ExecutionMode,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: Uuid,
    pub parent_task_id: Uuid,
    pub content: String,
    pub task_type: TaskType,
    pub priority: Priority,
    pub accuracy_requirement: f64,
}

/// An ordered sequence of concurrently-executable groups, plus a flattened
/// order preserved only for deterministic bookkeeping — every subtask
/// appears in exactly one group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub parallel_groups: Vec<Vec<Uuid>>,
    pub sequential_order: Vec<Uuid>,
}

impl ExecutionPlan {
    pub fn fully_sequential(subtask_ids: impl IntoIterator<Item = Uuid>) -> Self {
        let ids: Vec<Uuid> = subtask_ids.into_iter().collect();
        let parallel_groups = ids.iter().map(|id| vec![*id]).collect();
        Self {
            parallel_groups,
            sequential_order: ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub task_types: Vec<TaskType>,
    pub avg_cost_per_token: f64,
    pub avg_latency_ms: f64,
    pub max_context: u32,
    pub reliability: f64,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfAssessment {
    pub confidence: f64,
    pub assumptions: Vec<String>,
    pub risk_level: RiskLevel,
    pub estimated_cost: f64,
    pub token_usage: u32,
    pub execution_time_ms: u64,
    pub model_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub subtask_id: Uuid,
    pub model_used: String,
    pub content: String,
    pub self_assessment: Option<SelfAssessment>,
    pub success: bool,
    pub error_message: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl AgentResponse {
    pub fn confidence(&self) -> f64 {
        self.self_assessment.as_ref().map(|a| a.confidence).unwrap_or(0.0)
    }

    pub fn estimated_cost(&self) -> f64 {
        self.self_assessment.as_ref().map(|a| a.estimated_cost).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub chosen_response_id: Uuid,
    pub reasoning: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrationResult {
    pub validated_responses: Vec<AgentResponse>,
    pub conflicts_resolved: Vec<ConflictResolution>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total_cost: f64,
    pub execution_time_ms: u64,
    pub model_costs: HashMap<String, f64>,
    pub token_usage: HashMap<String, u32>,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub execution_path: Vec<String>,
    pub total_execution_time_ms: u64,
    pub parallel_executions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResponse {
    pub content: String,
    pub overall_confidence: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub models_used: Vec<String>,
    pub cost_breakdown: CostBreakdown,
    pub execution_metadata: ExecutionMetadata,
}

impl FinalResponse {
    pub fn degraded(content: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            overall_confidence: 0.2,
            success: false,
            error_message: Some(error_message.into()),
            models_used: Vec::new(),
            cost_breakdown: CostBreakdown::default(),
            execution_metadata: ExecutionMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Timeout,
    RateLimit,
    ModelUnavailable,
    Quality,
    PartialFailure,
    SystemOverload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEvent {
    pub kind: FailureKind,
    pub component: String,
    pub error_message: String,
    pub context: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitBreakerPhase {
    Closed,
    Open,
    HalfOpen,
}

/// A point-in-time snapshot of one component's breaker, for reporting —
/// the live breaker with its atomics lives in `council-resilience`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub component: String,
    pub phase: CircuitBreakerPhase,
    pub consecutive_failures: u64,
    pub successes_in_half_open: u64,
    pub opened_at: Option<DateTime<Utc>>,
}
