use crate::error::Result;
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::LlmMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Main interface for LLM interactions
pub struct LlmBroker {
    model: String,
    gateway: Arc<dyn LlmGateway>,
}

impl LlmBroker {
    /// Create a new LLM broker
    pub fn new(model: impl Into<String>, gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            model: model.into(),
            gateway,
        }
    }

    /// Name of the model this broker talks to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate text response from LLM
    pub async fn generate(
        &self,
        messages: &[LlmMessage],
        config: Option<CompletionConfig>,
    ) -> Result<String> {
        let config = config.unwrap_or_default();

        let response = self.gateway.complete(&self.model, messages, &config).await?;

        if let Some(reason) = &response.finish_reason {
            debug!("Completion finished: {}", reason);
        }

        Ok(response.content.unwrap_or_default())
    }

    /// Generate structured object response from LLM
    pub async fn generate_object<T>(
        &self,
        messages: &[LlmMessage],
        config: Option<CompletionConfig>,
    ) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Serialize + schemars::JsonSchema + Send,
    {
        let config = config.unwrap_or_default();

        // Generate JSON schema for the type
        let schema = serde_json::to_value(schemars::schema_for!(T))?;

        info!("Requesting structured output from {}", self.model);
        let json_response =
            self.gateway.complete_json(&self.model, messages, schema, &config).await?;

        let object: T = serde_json::from_value(json_response)?;

        Ok(object)
    }
}
