use crate::error::{Result, VislensError};
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::{LlmGatewayResponse, LlmMessage, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Configuration for connecting to Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub timeout: Option<std::time::Duration>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("OLLAMA_HOST")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            timeout: None,
        }
    }
}

/// Gateway for Ollama local LLM service
///
/// Vision-capable models served by Ollama receive images as base64 strings on the
/// message itself; structured output is requested by passing a JSON schema as `format`.
pub struct OllamaGateway {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGateway {
    /// Create a new Ollama gateway with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama gateway with custom configuration
    pub fn with_config(config: OllamaConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom host
    pub fn with_host(host: impl Into<String>) -> Result<Self> {
        Self::with_config(OllamaConfig {
            host: host.into(),
            ..Default::default()
        })
    }

    async fn post_chat(&self, body: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}/api/chat", self.config.host))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(VislensError::GatewayError(format!(
                "Ollama API error: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmGateway for OllamaGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to Ollama for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = serde_json::json!({
            "model": model,
            "messages": adapt_messages_to_ollama(messages),
            "options": extract_ollama_options(config),
            "stream": false
        });

        let response_body = self.post_chat(&body).await?;

        Ok(LlmGatewayResponse {
            content: response_body["message"]["content"].as_str().map(String::from),
            finish_reason: response_body["done_reason"].as_str().map(String::from),
        })
    }

    async fn complete_json(
        &self,
        model: &str,
        messages: &[LlmMessage],
        schema: Value,
        config: &CompletionConfig,
    ) -> Result<Value> {
        info!("Requesting structured output from Ollama");

        let body = serde_json::json!({
            "model": model,
            "messages": adapt_messages_to_ollama(messages),
            "options": extract_ollama_options(config),
            "format": schema,
            "stream": false
        });

        let response_body = self.post_chat(&body).await?;
        let content = response_body["message"]["content"].as_str().unwrap_or("");

        let json_value: Value = serde_json::from_str(content)?;

        Ok(json_value)
    }
}

// Message adapter for Ollama format
fn adapt_messages_to_ollama(messages: &[LlmMessage]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let mut ollama_msg = serde_json::json!({
                "role": match msg.role {
                    MessageRole::System => "system",
                    MessageRole::User => "user",
                    MessageRole::Assistant => "assistant",
                },
                "content": msg.content.as_deref().unwrap_or("")
            });

            // Ollama takes bare base64 payloads; the media type is sniffed server-side
            if let Some(images) = &msg.images {
                let encoded: Vec<&str> = images.iter().map(|img| img.data.as_str()).collect();
                ollama_msg["images"] = serde_json::json!(encoded);
            }

            ollama_msg
        })
        .collect()
}

// Extract Ollama-specific options from config
fn extract_ollama_options(config: &CompletionConfig) -> Value {
    let mut options = serde_json::json!({
        "temperature": config.temperature,
        "num_ctx": config.num_ctx,
    });

    if let Some(num_predict) = config.num_predict {
        if num_predict > 0 {
            options["num_predict"] = serde_json::json!(num_predict);
        }
    } else if config.max_tokens > 0 {
        options["num_predict"] = serde_json::json!(config.max_tokens);
    }

    options
}
