//! Produces an [`ExecutionPlan`] over a set of subtasks and picks fallback
//! models when a chosen one fails mid-execution.

use council_contracts::{ExecutionPlan, ModelCapabilities, ModelRegistry, Subtask};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("no model registered for task type")]
    NoModelAvailable,
}

#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub model_id: String,
}

/// Decides how subtasks are grouped for concurrent execution and which
/// model serves as the fallback when an initial choice fails.
///
/// The initial implementation declares no cross-subtask data dependency —
/// every subtask gets its own parallel group — so `sequential_order`
/// simply preserves the decomposer's emission order for deterministic
/// testing, per the router's documented semantics.
pub struct Router {
    registry: Arc<ModelRegistry>,
}

impl Router {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    pub fn determine_parallelism(&self, subtasks: &[Subtask]) -> ExecutionPlan {
        ExecutionPlan::fully_sequential(subtasks.iter().map(|s| s.id))
    }

    pub async fn select_fallback(
        &self,
        failed_model_id: &str,
        subtask: &Subtask,
    ) -> Result<ModelSelection, RoutingError> {
        let candidates = self.registry.get_models_for_task_type(subtask.task_type).await;
        let next: Option<(Arc<dyn council_contracts::Model>, ModelCapabilities)> = candidates
            .into_iter()
            .filter(|(model, _)| model.get_model_id() != failed_model_id)
            .max_by(|a, b| a.1.reliability.partial_cmp(&b.1.reliability).unwrap());

        next.map(|(model, _)| ModelSelection {
            model_id: model.get_model_id().to_string(),
        })
        .ok_or(RoutingError::NoModelAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_contracts::{Priority, TaskType};
    use uuid::Uuid;

    fn subtask(task_type: TaskType) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            parent_task_id: Uuid::new_v4(),
            content: "do the thing".into(),
            task_type,
            priority: Priority::Medium,
            accuracy_requirement: 0.7,
        }
    }

    #[test]
    fn every_subtask_gets_its_own_group() {
        let router = Router::new(Arc::new(ModelRegistry::new()));
        let subtasks = vec![subtask(TaskType::Reasoning), subtask(TaskType::Research)];
        let plan = router.determine_parallelism(&subtasks);
        assert_eq!(plan.parallel_groups.len(), 2);
        assert_eq!(plan.sequential_order, vec![subtasks[0].id, subtasks[1].id]);
    }
}
