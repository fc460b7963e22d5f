//! Detects and resolves disagreement among responses for the same subtask.
//!
//! Two responses conflict when their confidence diverges by more than the
//! configured threshold — a stand-in for a full semantic distance metric,
//! which this pipeline leaves pluggable via [`DistanceMetric`] rather than
//! hard-coding one, per the open question of how conflicts should be
//! detected for free-text content.

use council_contracts::{AgentResponse, ArbitrationResult, ConflictResolution};
use std::collections::HashMap;
use uuid::Uuid;

const DEFAULT_CONFIDENCE_DIVERGENCE: f64 = 0.2;

/// A pluggable measure of how far apart two responses to the same subtask
/// are. The default divergence-by-confidence metric is cheap and
/// model-agnostic; callers with embeddings or a judge model can substitute
/// their own.
pub trait DistanceMetric: Send + Sync {
    fn distance(&self, a: &AgentResponse, b: &AgentResponse) -> f64;
}

pub struct ConfidenceDivergence {
    pub threshold: f64,
}

impl Default for ConfidenceDivergence {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_CONFIDENCE_DIVERGENCE,
        }
    }
}

impl DistanceMetric for ConfidenceDivergence {
    fn distance(&self, a: &AgentResponse, b: &AgentResponse) -> f64 {
        (a.confidence() - b.confidence()).abs()
    }
}

pub struct ArbitrationLayer {
    metric: Box<dyn DistanceMetric>,
    threshold: f64,
}

impl ArbitrationLayer {
    pub fn new(metric: Box<dyn DistanceMetric>, threshold: f64) -> Self {
        Self { metric, threshold }
    }

    /// Resolves every response set, grouped by subtask: a set of one
    /// response needs no arbitration, and a set with a pairwise distance
    /// above the threshold yields a recorded conflict resolved in favor of
    /// the highest-confidence member (reliability-derived cost breaks a
    /// tie, since `AgentResponse` carries no model capability directly).
    pub fn arbitrate(&self, responses: Vec<AgentResponse>) -> ArbitrationResult {
        let mut by_subtask: HashMap<Uuid, Vec<AgentResponse>> = HashMap::new();
        for response in responses {
            by_subtask.entry(response.subtask_id).or_default().push(response);
        }

        let mut validated = Vec::new();
        let mut conflicts = Vec::new();

        for (_, group) in by_subtask {
            if group.len() <= 1 {
                validated.extend(group);
                continue;
            }

            let conflicted = group
                .iter()
                .enumerate()
                .flat_map(|(i, a)| group[i + 1..].iter().map(move |b| (a, b)))
                .any(|(a, b)| self.metric.distance(a, b) > self.threshold);

            let winner_idx = group
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| {
                    a.confidence()
                        .partial_cmp(&b.confidence())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .map(|(i, _)| i)
                .unwrap_or(0);

            if conflicted {
                let winner = &group[winner_idx];
                conflicts.push(ConflictResolution {
                    chosen_response_id: winner.subtask_id,
                    reasoning: format!(
                        "selected model '{}' with confidence {:.2} over {} alternatives",
                        winner.model_used,
                        winner.confidence(),
                        group.len() - 1
                    ),
                    confidence: winner.confidence(),
                });
            }

            validated.push(group.into_iter().nth(winner_idx).expect("winner index is in range"));
        }

        ArbitrationResult {
            validated_responses: validated,
            conflicts_resolved: conflicts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_contracts::SelfAssessment;
    use council_contracts::RiskLevel;

    fn response(subtask_id: Uuid, model: &str, confidence: f64) -> AgentResponse {
        AgentResponse {
            subtask_id,
            model_used: model.to_string(),
            content: "answer".into(),
            self_assessment: Some(SelfAssessment {
                confidence,
                assumptions: vec![],
                risk_level: RiskLevel::Low,
                estimated_cost: 0.0,
                token_usage: 0,
                execution_time_ms: 0,
                model_used: model.to_string(),
            }),
            success: true,
            error_message: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn single_response_needs_no_arbitration() {
        let layer = ArbitrationLayer::new(Box::new(ConfidenceDivergence::default()), 0.2);
        let id = Uuid::new_v4();
        let result = layer.arbitrate(vec![response(id, "m1", 0.9)]);
        assert_eq!(result.validated_responses.len(), 1);
        assert!(result.conflicts_resolved.is_empty());
    }

    #[test]
    fn diverging_confidence_is_flagged_and_resolved_by_highest_confidence() {
        let layer = ArbitrationLayer::new(Box::new(ConfidenceDivergence::default()), 0.2);
        let id = Uuid::new_v4();
        let result = layer.arbitrate(vec![response(id, "m1", 0.4), response(id, "m2", 0.9)]);
        assert_eq!(result.conflicts_resolved.len(), 1);
        assert_eq!(result.validated_responses[0].model_used, "m2");
    }

    #[test]
    fn close_confidence_is_not_a_conflict() {
        let layer = ArbitrationLayer::new(Box::new(ConfidenceDivergence::default()), 0.2);
        let id = Uuid::new_v4();
        let result = layer.arbitrate(vec![response(id, "m1", 0.8), response(id, "m2", 0.85)]);
        assert!(result.conflicts_resolved.is_empty());
        assert_eq!(result.validated_responses.len(), 1);
    }
}
