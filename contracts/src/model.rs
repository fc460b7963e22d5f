//! The external model capability contract (§6): the only thing the core
//! consumes from model adapters, kept narrow and explicit rather than a
//! duck-typed object the orchestrator probes at call time.

use crate::types::{ModelCapabilities, TaskType};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Error, Clone)]
pub enum ModelCallError {
    #[error("model call timed out")]
    Timeout,
    #[error("provider rate limited: {0}")]
    RateLimit(String),
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("provider error: {0}")]
    Provider(String),
}

/// What the orchestrator needs from a model adapter. Adapters (HTTP
/// clients to third-party inference APIs) live outside the core and
/// implement this trait.
#[async_trait]
pub trait Model: Send + Sync {
    fn get_model_id(&self) -> &str;

    async fn generate(&self, prompt: &str, options: GenerateOptions) -> Result<String, ModelCallError>;
}

/// Registers models alongside their advertised capabilities and answers
/// "which models can serve this task type".
#[derive(Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, (Arc<dyn Model>, ModelCapabilities)>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_model(&self, model: Arc<dyn Model>, capabilities: ModelCapabilities) {
        let id = model.get_model_id().to_string();
        self.models.write().await.insert(id, (model, capabilities));
    }

    pub async fn get_models_for_task_type(&self, task_type: TaskType) -> Vec<(Arc<dyn Model>, ModelCapabilities)> {
        self.models
            .read()
            .await
            .values()
            .filter(|(_, caps)| caps.task_types.contains(&task_type))
            .cloned()
            .collect()
    }

    pub async fn get(&self, model_id: &str) -> Option<(Arc<dyn Model>, ModelCapabilities)> {
        self.models.read().await.get(model_id).cloned()
    }

    pub async fn all_model_ids(&self) -> Vec<String> {
        self.models.read().await.keys().cloned().collect()
    }
}
