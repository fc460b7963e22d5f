//! Cost/quality-aware model selection.
//!
//! Maintains a per-model rolling average of observed cost and confidence,
//! fed by successful responses, and used only for the current process —
//! whether that history should persist across restarts was left open by
//! the design this pipeline follows; the default here is process-local
//! only, same as the cost optimizer's own performance history.

use council_contracts::{ExecutionMode, ModelCapabilities};
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CostOptimizerError {
    #[error("no candidate models available")]
    NoCandidates,
}

#[derive(Debug, Clone)]
pub struct ModelSelectionDecision {
    pub recommended_model: String,
    pub estimated_cost: f64,
    pub estimated_time_ms: f64,
    pub quality_score: f64,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy)]
struct RollingAverage {
    cost: f64,
    confidence: f64,
    samples: u64,
}

impl RollingAverage {
    fn update(&mut self, cost: f64, confidence: f64) {
        let n = self.samples as f64;
        self.cost = (self.cost * n + cost) / (n + 1.0);
        self.confidence = (self.confidence * n + confidence) / (n + 1.0);
        self.samples += 1;
    }
}

impl Default for RollingAverage {
    fn default() -> Self {
        Self {
            cost: 0.0,
            confidence: 0.0,
            samples: 0,
        }
    }
}

fn cost_multiplier(mode: ExecutionMode) -> f64 {
    match mode {
        ExecutionMode::Fast => 0.7,
        ExecutionMode::Balanced => 1.0,
        ExecutionMode::BestQuality => 1.5,
    }
}

fn quality_threshold(mode: ExecutionMode) -> f64 {
    match mode {
        ExecutionMode::Fast => 0.6,
        ExecutionMode::Balanced => 0.8,
        ExecutionMode::BestQuality => 0.95,
    }
}

/// Candidate model plus the capabilities the router already looked up.
pub struct Candidate<'a> {
    pub model_id: &'a str,
    pub capabilities: &'a ModelCapabilities,
    pub prompt_len_chars: usize,
}

pub struct CostOptimizer {
    history: DashMap<String, RollingAverage>,
}

impl CostOptimizer {
    pub fn new() -> Self {
        Self {
            history: DashMap::new(),
        }
    }

    pub fn record_success(&self, model_id: &str, actual_cost: f64, actual_confidence: f64) {
        self.history
            .entry(model_id.to_string())
            .or_default()
            .update(actual_cost, actual_confidence);
    }

    /// `estimate_cost` and `estimate_time_ms` grow monotonically with
    /// `prompt_len_chars`, and for a fixed candidate set
    /// `FAST ≤ BALANCED ≤ BEST_QUALITY` because the multiplier itself is
    /// ordered that way.
    pub fn optimize_model_selection(
        &self,
        mode: ExecutionMode,
        candidates: &[Candidate<'_>],
    ) -> Result<ModelSelectionDecision, CostOptimizerError> {
        if candidates.is_empty() {
            return Err(CostOptimizerError::NoCandidates);
        }

        let multiplier = cost_multiplier(mode);
        let threshold = quality_threshold(mode);

        let mut scored: Vec<(f64, f64, f64, &Candidate<'_>)> = candidates
            .iter()
            .map(|c| {
                let base_cost = c.capabilities.avg_cost_per_token * (c.prompt_len_chars as f64 / 4.0).max(1.0);
                let estimated_cost = base_cost * multiplier;
                let estimated_time_ms = c.capabilities.avg_latency_ms * multiplier;
                let quality_score = self.quality_score(c);
                (estimated_cost, estimated_time_ms, quality_score, c)
            })
            .collect();

        let eligible: Vec<_> = scored.iter().filter(|(_, _, q, _)| *q >= threshold).collect();
        let pool: Vec<_> = if eligible.is_empty() { scored.iter().collect() } else { eligible };

        let chosen = match mode {
            ExecutionMode::Fast => pool
                .into_iter()
                .min_by(|a, b| self.break_ties(a.1, b.1, a.3, b.3, |x| x.1)),
            ExecutionMode::Balanced => pool
                .into_iter()
                .max_by(|a, b| self.break_ties(a.2 / a.0.max(1e-9), b.2 / b.0.max(1e-9), a.3, b.3, |x| -x.0)),
            ExecutionMode::BestQuality => pool
                .into_iter()
                .max_by(|a, b| self.break_ties(a.2, b.2, a.3, b.3, |x| -x.0)),
        }
        .ok_or(CostOptimizerError::NoCandidates)?;

        scored.retain(|c| std::ptr::eq(c.3, chosen.3));
        let (estimated_cost, estimated_time_ms, quality_score, candidate) = scored[0];

        Ok(ModelSelectionDecision {
            recommended_model: candidate.model_id.to_string(),
            estimated_cost,
            estimated_time_ms,
            quality_score,
            confidence: quality_score,
            reasoning: format!(
                "{mode:?} mode selected '{}': quality {:.2}, estimated cost {:.4}",
                candidate.model_id, quality_score, estimated_cost
            ),
        })
    }

    fn quality_score(&self, candidate: &Candidate<'_>) -> f64 {
        let history_boost = self
            .history
            .get(candidate.model_id)
            .map(|h| h.confidence)
            .unwrap_or(candidate.capabilities.reliability);
        (candidate.capabilities.reliability + history_boost) / 2.0
    }

    /// Break a tie on the primary metric by reliability, then lexicographic
    /// model id, matching the tie-break rule for every optimization mode.
    fn break_ties(
        &self,
        primary_a: f64,
        primary_b: f64,
        a: &Candidate<'_>,
        b: &Candidate<'_>,
        _unused: impl Fn(&(f64, f64, f64, &Candidate<'_>)) -> f64,
    ) -> std::cmp::Ordering {
        primary_a
            .partial_cmp(&primary_b)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.capabilities
                    .reliability
                    .partial_cmp(&b.capabilities.reliability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.model_id.cmp(b.model_id))
    }
}

impl Default for CostOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_contracts::TaskType;

    fn caps(reliability: f64) -> ModelCapabilities {
        ModelCapabilities {
            task_types: vec![TaskType::Reasoning],
            avg_cost_per_token: 0.001,
            avg_latency_ms: 500.0,
            max_context: 8192,
            reliability,
            strengths: vec![],
            weaknesses: vec![],
        }
    }

    #[test]
    fn cost_ordering_holds_across_modes() {
        let optimizer = CostOptimizer::new();
        let caps_a = caps(0.9);
        let candidates = vec![Candidate {
            model_id: "m",
            capabilities: &caps_a,
            prompt_len_chars: 400,
        }];

        let fast = optimizer.optimize_model_selection(ExecutionMode::Fast, &candidates).unwrap();
        let balanced = optimizer.optimize_model_selection(ExecutionMode::Balanced, &candidates).unwrap();
        let best = optimizer.optimize_model_selection(ExecutionMode::BestQuality, &candidates).unwrap();

        assert!(fast.estimated_cost <= balanced.estimated_cost);
        assert!(balanced.estimated_cost <= best.estimated_cost);
    }

    #[test]
    fn cost_grows_with_input_length() {
        let optimizer = CostOptimizer::new();
        let caps_a = caps(0.9);
        let short = vec![Candidate {
            model_id: "m",
            capabilities: &caps_a,
            prompt_len_chars: 40,
        }];
        let long = vec![Candidate {
            model_id: "m",
            capabilities: &caps_a,
            prompt_len_chars: 4000,
        }];

        let short_cost = optimizer.optimize_model_selection(ExecutionMode::Balanced, &short).unwrap();
        let long_cost = optimizer.optimize_model_selection(ExecutionMode::Balanced, &long).unwrap();
        assert!(short_cost.estimated_cost <= long_cost.estimated_cost);
    }

    #[test]
    fn ties_break_by_model_id() {
        let optimizer = CostOptimizer::new();
        let caps_a = caps(0.9);
        let caps_b = caps(0.9);
        let candidates = vec![
            Candidate {
                model_id: "zeta",
                capabilities: &caps_a,
                prompt_len_chars: 100,
            },
            Candidate {
                model_id: "alpha",
                capabilities: &caps_b,
                prompt_len_chars: 100,
            },
        ];

        let decision = optimizer.optimize_model_selection(ExecutionMode::BestQuality, &candidates).unwrap();
        assert_eq!(decision.recommended_model, "alpha");
    }
}
