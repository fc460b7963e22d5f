//! Combines validated responses into a single [`FinalResponse`], weighting
//! each subtask's contribution by its originating priority.

use council_contracts::{
    AgentResponse, CostBreakdown, ExecutionMetadata, FinalResponse, Priority, Subtask,
};
use std::collections::HashMap;
use uuid::Uuid;

pub struct SynthesisLayer;

impl SynthesisLayer {
    pub fn new() -> Self {
        Self
    }

    /// Confidence is a weighted mean over the responses that succeeded,
    /// weighted by the priority of the subtask each one answers; a subtask
    /// with no matching response contributes nothing to either side of the
    /// mean. Failing to find any successful response yields a degraded
    /// [`FinalResponse`] rather than dividing by zero.
    pub fn synthesize(
        &self,
        responses: &[AgentResponse],
        subtasks: &[Subtask],
        execution_path: Vec<String>,
        total_execution_time_ms: u64,
        parallel_executions: usize,
        currency: &str,
    ) -> FinalResponse {
        let priority_by_subtask: HashMap<Uuid, Priority> =
            subtasks.iter().map(|s| (s.id, s.priority)).collect();

        let successful: Vec<&AgentResponse> = responses.iter().filter(|r| r.success).collect();

        if successful.is_empty() {
            return FinalResponse::degraded(String::new(), "no subtask produced a usable response");
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;
        for response in &successful {
            let weight = priority_by_subtask
                .get(&response.subtask_id)
                .map(|p| p.weight())
                .unwrap_or(1.0);
            weighted_sum += response.confidence() * weight;
            weight_total += weight;
        }
        let overall_confidence = if weight_total > 0.0 { weighted_sum / weight_total } else { 0.0 };

        let content = successful
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let models_used: Vec<String> = {
            let mut ids: Vec<String> = successful.iter().map(|r| r.model_used.clone()).collect();
            ids.sort();
            ids.dedup();
            ids
        };

        let mut model_costs = HashMap::new();
        let mut token_usage = HashMap::new();
        let mut total_cost = 0.0;
        for response in &successful {
            let cost = response.estimated_cost();
            total_cost += cost;
            *model_costs.entry(response.model_used.clone()).or_insert(0.0) += cost;
            if let Some(assessment) = &response.self_assessment {
                *token_usage.entry(response.model_used.clone()).or_insert(0) += assessment.token_usage;
            }
        }

        FinalResponse {
            content,
            overall_confidence,
            success: true,
            error_message: None,
            models_used,
            cost_breakdown: CostBreakdown {
                total_cost,
                execution_time_ms: total_execution_time_ms,
                model_costs,
                token_usage,
                currency: currency.to_string(),
            },
            execution_metadata: ExecutionMetadata {
                execution_path,
                total_execution_time_ms,
                parallel_executions,
            },
        }
    }
}

impl Default for SynthesisLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_contracts::{RiskLevel, SelfAssessment, TaskType};

    fn subtask(id: Uuid, priority: Priority) -> Subtask {
        Subtask {
            id,
            parent_task_id: Uuid::new_v4(),
            content: "x".into(),
            task_type: TaskType::Reasoning,
            priority,
            accuracy_requirement: 0.7,
        }
    }

    fn response(subtask_id: Uuid, confidence: f64, success: bool) -> AgentResponse {
        AgentResponse {
            subtask_id,
            model_used: "m1".into(),
            content: "part".into(),
            self_assessment: Some(SelfAssessment {
                confidence,
                assumptions: vec![],
                risk_level: RiskLevel::Low,
                estimated_cost: 0.01,
                token_usage: 10,
                execution_time_ms: 5,
                model_used: "m1".into(),
            }),
            success,
            error_message: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn no_successful_responses_yields_degraded_response() {
        let layer = SynthesisLayer::new();
        let id = Uuid::new_v4();
        let final_response = layer.synthesize(&[response(id, 0.0, false)], &[subtask(id, Priority::Medium)], vec![], 0, 0, "USD");
        assert!(!final_response.success);
    }

    #[test]
    fn higher_priority_subtask_dominates_weighted_confidence() {
        let layer = SynthesisLayer::new();
        let high_id = Uuid::new_v4();
        let low_id = Uuid::new_v4();
        let subtasks = vec![subtask(high_id, Priority::High), subtask(low_id, Priority::Low)];
        let responses = vec![response(high_id, 0.9, true), response(low_id, 0.1, true)];

        let final_response = layer.synthesize(&responses, &subtasks, vec!["analysis".into()], 100, 2, "USD");
        assert!(final_response.overall_confidence > 0.5);
        assert!(final_response.success);
        assert_eq!(final_response.models_used, vec!["m1".to_string()]);
        assert_eq!(final_response.cost_breakdown.currency, "USD");
    }
}
