//! Stage events published on the event bus, and the wire envelope that
//! carries them.

use crate::error::ContractError;
use crate::schema::validate_event_envelope;
use crate::types::{
    Complexity, ConflictResolution, CostBreakdown, ExecutionMetadata, ExecutionMode, Intent,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingAssignment {
    pub subtask_id: Uuid,
    pub task_type: String,
    pub model_id: String,
    pub reason: String,
    pub estimated_cost: f64,
    pub estimated_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStage {
    Started,
    Complete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StageEvent {
    ProcessingStarted {
        execution_mode: ExecutionMode,
    },
    AnalysisComplete {
        intent: Intent,
        complexity: Complexity,
    },
    RoutingComplete {
        assignments: Vec<RoutingAssignment>,
        total_subtasks: usize,
    },
    ExecutionProgress {
        subtask_id: Uuid,
        model_id: String,
        status: ExecutionStatus,
        confidence: f64,
        cost: f64,
        execution_time_ms: u64,
        success: bool,
        error_message: Option<String>,
    },
    ArbitrationDecision {
        conflicts_detected: usize,
        decisions: Vec<ConflictResolution>,
        conflicting_results: Vec<Uuid>,
    },
    SynthesisProgress {
        stage: SynthesisStage,
        content: Option<String>,
        overall_confidence: Option<f64>,
        success: Option<bool>,
        models_used: Option<Vec<String>>,
        cost_breakdown: Option<CostBreakdown>,
        execution_metadata: Option<ExecutionMetadata>,
    },
    FinalResponse {
        content: String,
        overall_confidence: f64,
        success: bool,
        models_used: Vec<String>,
        cost_breakdown: CostBreakdown,
        execution_metadata: ExecutionMetadata,
        error_message: Option<String>,
    },
    Error {
        message: String,
    },
}

/// The wire envelope every published event is wrapped in:
/// `{ request_id, type, data, ts }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub request_id: Uuid,
    #[serde(flatten)]
    pub event: StageEvent,
    pub ts: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(request_id: Uuid, event: StageEvent) -> Self {
        Self {
            request_id,
            event,
            ts: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), ContractError> {
        let value = serde_json::to_value(self)?;
        validate_event_envelope(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_json() {
        let envelope = EventEnvelope::new(
            Uuid::new_v4(),
            StageEvent::Error {
                message: "boom".into(),
            },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["message"], "boom");
        assert!(envelope.validate().is_ok());
    }
}
