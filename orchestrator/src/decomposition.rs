//! Expands a [`Task`] into one or more typed, prioritized [`Subtask`]s.

use council_contracts::{Priority, Subtask, Task, TaskType};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DecompositionError {
    #[error("decomposition produced no subtasks")]
    Empty,
    #[error("subtask {0} has empty content")]
    EmptyContent(Uuid),
}

/// Dispatches on substrings of the task content to pick apart a request
/// into independently routable pieces. Each recognized pattern contributes
/// one subtask; unmatched content falls back to a single reasoning subtask.
pub struct TaskDecomposer {
    patterns: Vec<(&'static str, TaskType, Priority)>,
}

impl TaskDecomposer {
    pub fn new() -> Self {
        Self {
            patterns: vec![
                ("research", TaskType::Research, Priority::Medium),
                ("find", TaskType::Research, Priority::Medium),
                ("debug", TaskType::Debugging, Priority::High),
                ("fix", TaskType::Debugging, Priority::High),
                ("implement", TaskType::CodeGeneration, Priority::High),
                ("write code", TaskType::CodeGeneration, Priority::High),
                ("verify", TaskType::FactChecking, Priority::Medium),
                ("fact check", TaskType::FactChecking, Priority::Medium),
            ],
        }
    }

    pub fn decompose(&self, task: &Task) -> Vec<Subtask> {
        let lower = task.content.to_lowercase();
        let mut matched: Vec<(TaskType, Priority)> = self
            .patterns
            .iter()
            .filter(|(needle, ..)| lower.contains(needle))
            .map(|(_, task_type, priority)| (*task_type, *priority))
            .collect();
        matched.dedup_by_key(|(task_type, _)| *task_type);

        if matched.is_empty() {
            matched.push((TaskType::Reasoning, Priority::Medium));
        }

        matched
            .into_iter()
            .map(|(task_type, priority)| Subtask {
                id: Uuid::new_v4(),
                parent_task_id: task.id,
                content: task.content.clone(),
                task_type,
                priority,
                accuracy_requirement: 0.7,
            })
            .collect()
    }

    /// The orchestrator's fallback when decomposition itself fails: a
    /// single subtask carrying the original content, typed as reasoning.
    pub fn fallback(task: &Task) -> Vec<Subtask> {
        vec![Subtask {
            id: Uuid::new_v4(),
            parent_task_id: task.id,
            content: task.content.clone(),
            task_type: TaskType::Reasoning,
            priority: Priority::Medium,
            accuracy_requirement: 0.7,
        }]
    }

    pub fn validate_decomposition(&self, subtasks: &[Subtask]) -> Result<(), DecompositionError> {
        if subtasks.is_empty() {
            return Err(DecompositionError::Empty);
        }
        for subtask in subtasks {
            if subtask.content.trim().is_empty() {
                return Err(DecompositionError::EmptyContent(subtask.id));
            }
        }
        Ok(())
    }
}

impl Default for TaskDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use council_contracts::{Complexity, ExecutionMode, Intent};

    fn sample_task(content: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            content: content.to_string(),
            intent: Intent::Generative,
            complexity: Complexity::Moderate,
            execution_mode: ExecutionMode::Balanced,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn unmatched_content_decomposes_to_one_reasoning_subtask() {
        let decomposer = TaskDecomposer::new();
        let subtasks = decomposer.decompose(&sample_task("Summarize the quarterly report"));
        assert_eq!(subtasks.len(), 1);
        assert_eq!(subtasks[0].task_type, TaskType::Reasoning);
    }

    #[test]
    fn multiple_patterns_produce_multiple_subtasks() {
        let decomposer = TaskDecomposer::new();
        let subtasks = decomposer.decompose(&sample_task("Research the library, then implement a wrapper"));
        let types: Vec<_> = subtasks.iter().map(|s| s.task_type).collect();
        assert!(types.contains(&TaskType::Research));
        assert!(types.contains(&TaskType::CodeGeneration));
    }

    #[test]
    fn validation_rejects_empty_set() {
        let decomposer = TaskDecomposer::new();
        assert!(decomposer.validate_decomposition(&[]).is_err());
    }
}
