//! Intent and complexity classification of raw user input.
//!
//! Deterministic for a fixed input and pure with respect to external
//! state: no network calls, no shared mutable state. Errors bubble as
//! [`AnalysisError`] and are counted by the analysis breaker — this engine
//! itself never talks to a breaker, the orchestrator wraps it.

use council_contracts::{Complexity, Intent, TaskType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("cannot analyze empty input")]
    EmptyInput,
}

#[derive(Debug, Clone)]
pub struct AnalysisEngine;

impl AnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze_intent(&self, text: &str) -> Result<Intent, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let lower = text.to_lowercase();
        if lower.contains('?') || lower.starts_with("what") || lower.starts_with("how") || lower.starts_with("why") {
            Ok(Intent::Informational)
        } else if lower.contains("generate") || lower.contains("write") || lower.contains("create") {
            Ok(Intent::Generative)
        } else if lower.contains("analyze") || lower.contains("compare") || lower.contains("evaluate") {
            Ok(Intent::Analytical)
        } else {
            Ok(Intent::Conversational)
        }
    }

    pub fn determine_complexity(&self, text: &str) -> Result<Complexity, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let word_count = text.split_whitespace().count();
        let clause_count = text.matches(&[',', ';'][..]).count() + 1;

        Ok(if word_count > 60 || clause_count > 4 {
            Complexity::Complex
        } else if word_count > 20 || clause_count > 2 {
            Complexity::Moderate
        } else {
            Complexity::Simple
        })
    }

    /// Falls back to `[Reasoning]` on any internal failure. Retained as-is
    /// from the behavior this pipeline stage was modeled on; a future pass
    /// may want a narrower fallback than blanket reasoning.
    pub fn classify_task_type(&self, text: &str) -> Vec<TaskType> {
        self.try_classify_task_type(text).unwrap_or_else(|_| vec![TaskType::Reasoning])
    }

    fn try_classify_task_type(&self, text: &str) -> Result<Vec<TaskType>, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        let lower = text.to_lowercase();
        let mut types = Vec::new();

        if lower.contains("code") || lower.contains("function") || lower.contains("implement") {
            types.push(TaskType::CodeGeneration);
        }
        if lower.contains("bug") || lower.contains("fix") || lower.contains("debug") || lower.contains("error") {
            types.push(TaskType::Debugging);
        }
        if lower.contains("research") || lower.contains("find") || lower.contains("search") {
            types.push(TaskType::Research);
        }
        if lower.contains("verify") || lower.contains("fact") || lower.contains("check") {
            types.push(TaskType::FactChecking);
        }
        if types.is_empty() {
            types.push(TaskType::Reasoning);
        }
        Ok(types)
    }
}

impl Default for AnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_an_error() {
        let engine = AnalysisEngine::new();
        assert!(engine.analyze_intent("").is_err());
        assert!(engine.determine_complexity("   ").is_err());
    }

    #[test]
    fn question_is_informational() {
        let engine = AnalysisEngine::new();
        assert_eq!(engine.analyze_intent("What is the capital of France?").unwrap(), Intent::Informational);
    }

    #[test]
    fn long_multi_clause_text_is_complex() {
        let engine = AnalysisEngine::new();
        let text = "a b c d e f g h i j k l m n o p q r s t u v w x y z a b c d e f g h i j k l m n o p q r s t u v w x y z, and then some more, and even more";
        assert_eq!(engine.determine_complexity(text).unwrap(), Complexity::Complex);
    }

    #[test]
    fn unclassifiable_text_falls_back_to_reasoning() {
        let engine = AnalysisEngine::new();
        assert_eq!(engine.classify_task_type("hello there"), vec![TaskType::Reasoning]);
    }
}
