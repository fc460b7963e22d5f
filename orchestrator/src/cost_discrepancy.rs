//! Flags requests whose pre-flight cost estimate and actual aggregated cost
//! diverge sharply — a large discrepancy means the router's cost model needs
//! tuning, not that anything about the request itself failed.

use tracing::warn;

/// Ratios above this are logged; anything tighter is normal estimation
/// slack and not worth a warning.
pub const DISCREPANCY_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscrepancySummary {
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub cost_difference: f64,
    pub discrepancy_ratio: f64,
    pub exceeds_threshold: bool,
}

/// `|actual - estimate| / estimate`. An estimate of zero is treated as an
/// infinite discrepancy whenever anything was actually spent, and as no
/// discrepancy when nothing was.
pub fn discrepancy_ratio(estimated_cost: f64, actual_cost: f64) -> f64 {
    if estimated_cost == 0.0 {
        return if actual_cost > 0.0 { f64::INFINITY } else { 0.0 };
    }
    (actual_cost - estimated_cost).abs() / estimated_cost
}

pub fn summarize(estimated_cost: f64, actual_cost: f64) -> DiscrepancySummary {
    let ratio = discrepancy_ratio(estimated_cost, actual_cost);
    DiscrepancySummary {
        estimated_cost,
        actual_cost,
        cost_difference: actual_cost - estimated_cost,
        discrepancy_ratio: ratio,
        exceeds_threshold: ratio > DISCREPANCY_THRESHOLD,
    }
}

/// Logs a warning when the discrepancy exceeds [`DISCREPANCY_THRESHOLD`];
/// returns the summary either way so a caller can record it without
/// recomputing.
pub fn check_and_log(request_id: uuid::Uuid, execution_mode: &str, estimated_cost: f64, actual_cost: f64) -> DiscrepancySummary {
    let summary = summarize(estimated_cost, actual_cost);
    if summary.exceeds_threshold {
        warn!(
            %request_id,
            execution_mode,
            estimated_cost = summary.estimated_cost,
            actual_cost = summary.actual_cost,
            discrepancy_ratio = summary.discrepancy_ratio,
            "cost estimate diverged sharply from actual spend"
        );
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_zero_for_exact_match() {
        assert_eq!(discrepancy_ratio(1.0, 1.0), 0.0);
    }

    #[test]
    fn zero_estimate_with_spend_is_infinite() {
        assert_eq!(discrepancy_ratio(0.0, 0.2), f64::INFINITY);
    }

    #[test]
    fn zero_estimate_with_no_spend_is_zero() {
        assert_eq!(discrepancy_ratio(0.0, 0.0), 0.0);
    }

    #[test]
    fn summary_flags_large_overshoot() {
        let summary = summarize(1.0, 2.0);
        assert!(summary.exceeds_threshold);
        assert_eq!(summary.cost_difference, 1.0);
    }

    #[test]
    fn summary_ignores_small_drift() {
        let summary = summarize(1.0, 1.1);
        assert!(!summary.exceeds_threshold);
    }

    #[test]
    fn check_and_log_returns_summary_without_panicking_when_under_threshold() {
        let summary = check_and_log(uuid::Uuid::new_v4(), "BALANCED", 1.0, 1.05);
        assert!(!summary.exceeds_threshold);
    }
}
