//! Health aggregation across the breakers and queues that make up the core.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn priority(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 2,
        }
    }
}

/// Snapshot of a single component's health, keyed by component name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub detail: Option<String>,
}

/// Overall health report the orchestrator surfaces for `health_check()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: HealthStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthReport {
    /// Whether the system is operational enough to keep accepting requests.
    /// Only `Unhealthy` takes the system fully offline; `Degraded` still
    /// means "operational" in the `operational`/`degraded` vocabulary the
    /// orchestrator reports.
    pub fn is_operational(&self) -> bool {
        !matches!(self.overall, HealthStatus::Unhealthy)
    }

    pub fn label(&self) -> &'static str {
        match self.overall {
            HealthStatus::Healthy | HealthStatus::Degraded => "operational",
            HealthStatus::Unhealthy => "degraded",
        }
    }
}

/// Aggregates component health reports into a single worst-of-all verdict.
#[derive(Debug, Default)]
pub struct HealthCheckManager {
    components: HashMap<String, ComponentHealth>,
}

impl HealthCheckManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, name: impl Into<String>, status: HealthStatus, detail: Option<String>) {
        let name = name.into();
        self.components.insert(
            name.clone(),
            ComponentHealth {
                name,
                status,
                detail,
            },
        );
    }

    pub fn overall(&self) -> HealthReport {
        let overall = self
            .components
            .values()
            .map(|c| c.status)
            .max_by_key(|s| s.priority())
            .unwrap_or(HealthStatus::Healthy);

        HealthReport {
            overall,
            components: self.components.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_components_is_healthy() {
        let manager = HealthCheckManager::new();
        assert_eq!(manager.overall().overall, HealthStatus::Healthy);
    }

    #[test]
    fn worst_component_wins() {
        let mut manager = HealthCheckManager::new();
        manager.report("router", HealthStatus::Healthy, None);
        manager.report("arbitration", HealthStatus::Degraded, Some("breaker half-open".into()));
        let report = manager.overall();
        assert_eq!(report.overall, HealthStatus::Degraded);
        assert_eq!(report.label(), "operational");
        assert!(report.is_operational());
    }

    #[test]
    fn unhealthy_component_is_not_operational() {
        let mut manager = HealthCheckManager::new();
        manager.report("router", HealthStatus::Unhealthy, Some("breaker open".into()));
        let report = manager.overall();
        assert!(!report.is_operational());
        assert_eq!(report.label(), "degraded");
    }
}
