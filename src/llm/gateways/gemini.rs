//! Gemini Gateway for multimodal LLM interactions.
//!
//! This module talks to the Google Generative Language REST API
//! (`models/{model}:generateContent`). System messages become the request's
//! `systemInstruction`, images travel as `inlineData` parts, and structured output
//! is requested with `responseMimeType` plus a `responseSchema`.

use crate::error::{Result, VislensError};
use crate::llm::gateway::{CompletionConfig, LlmGateway};
use crate::llm::models::{LlmGatewayResponse, LlmMessage, MessageRole};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Configuration for connecting to the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Option<std::time::Duration>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .or_else(|_| std::env::var("API_KEY"))
                .unwrap_or_default(),
            base_url: std::env::var("GEMINI_API_ENDPOINT")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string()),
            timeout: None,
        }
    }
}

/// Gateway for Google's Gemini models.
pub struct GeminiGateway {
    client: Client,
    config: GeminiConfig,
}

impl GeminiGateway {
    /// Create a new Gemini gateway with custom configuration.
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder.build()?;

        Ok(Self { client, config })
    }

    /// Create gateway with custom API key and base URL.
    pub fn with_api_key_and_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Self::with_config(GeminiConfig {
            api_key: api_key.into(),
            base_url: base_url.into(),
            ..Default::default()
        })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value> {
        if self.config.api_key.is_empty() {
            return Err(VislensError::ConfigError(
                "Gemini API key is not set (GEMINI_API_KEY)".to_string(),
            ));
        }

        let response = self
            .client
            .post(format!("{}/models/{}:generateContent", self.config.base_url, model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(VislensError::GatewayError(format!(
                "Gemini API error: {} - {}",
                status, error_text
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl LlmGateway for GeminiGateway {
    async fn complete(
        &self,
        model: &str,
        messages: &[LlmMessage],
        config: &CompletionConfig,
    ) -> Result<LlmGatewayResponse> {
        info!("Delegating to Gemini for completion");
        debug!("Model: {}, Message count: {}", model, messages.len());

        let body = build_request_body(messages, generation_config(config));
        let response_body = self.generate_content(model, &body).await?;

        let response = parse_candidate(&response_body);
        if response.content.is_none() {
            warn!(
                finish_reason = ?response.finish_reason,
                "Gemini returned no text content"
            );
        }

        Ok(response)
    }

    async fn complete_json(
        &self,
        model: &str,
        messages: &[LlmMessage],
        schema: Value,
        config: &CompletionConfig,
    ) -> Result<Value> {
        info!("Requesting structured output from Gemini");

        let mut generation = generation_config(config);
        generation["responseMimeType"] = serde_json::json!("application/json");
        generation["responseSchema"] = to_gemini_schema(&schema);

        let body = build_request_body(messages, generation);
        let response_body = self.generate_content(model, &body).await?;

        // A blocked or empty candidate is unparsable output, not a transport failure
        let content = parse_candidate(&response_body).content;

        Ok(serde_json::from_str(content.as_deref().unwrap_or(""))?)
    }
}

fn generation_config(config: &CompletionConfig) -> Value {
    let mut generation = serde_json::json!({ "temperature": config.temperature });

    let max_tokens = match config.num_predict {
        Some(n) if n > 0 => n as usize,
        _ => config.max_tokens,
    };
    if max_tokens > 0 {
        generation["maxOutputTokens"] = serde_json::json!(max_tokens);
    }

    generation
}

fn build_request_body(messages: &[LlmMessage], generation: Value) -> Value {
    let system_text: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .filter_map(|m| m.content.as_deref())
        .collect();

    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(adapt_message_to_gemini)
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
        "generationConfig": generation,
    });

    if !system_text.is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": system_text.join("\n\n") }]
        });
    }

    body
}

fn adapt_message_to_gemini(msg: &LlmMessage) -> Value {
    let role = match msg.role {
        MessageRole::Assistant => "model",
        _ => "user",
    };

    let mut parts = Vec::new();
    if let Some(images) = &msg.images {
        for image in images {
            parts.push(serde_json::json!({
                "inlineData": { "mimeType": image.media_type, "data": image.data }
            }));
        }
    }
    if let Some(text) = &msg.content {
        parts.push(serde_json::json!({ "text": text }));
    }

    serde_json::json!({ "role": role, "parts": parts })
}

fn parse_candidate(response_body: &Value) -> LlmGatewayResponse {
    let candidate = &response_body["candidates"][0];

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect())
        .unwrap_or_default();

    LlmGatewayResponse {
        content: if text.is_empty() { None } else { Some(text) },
        finish_reason: candidate["finishReason"].as_str().map(String::from),
    }
}

/// Reduce a JSON Schema document to the OpenAPI subset accepted by `responseSchema`.
fn to_gemini_schema(schema: &Value) -> Value {
    let Some(object) = schema.as_object() else {
        return schema.clone();
    };

    let mut out = Map::new();
    for (key, value) in object {
        match key.as_str() {
            "type" => match value {
                Value::String(t) => {
                    out.insert(key.clone(), Value::String(t.to_uppercase()));
                }
                Value::Array(types) => {
                    if let Some(t) = types.iter().filter_map(Value::as_str).find(|t| *t != "null") {
                        out.insert(key.clone(), Value::String(t.to_uppercase()));
                    }
                    if types.iter().any(|t| t == "null") {
                        out.insert("nullable".to_string(), Value::Bool(true));
                    }
                }
                _ => {}
            },
            "properties" => {
                let props = value
                    .as_object()
                    .map(|p| p.iter().map(|(k, v)| (k.clone(), to_gemini_schema(v))).collect())
                    .unwrap_or_default();
                out.insert(key.clone(), Value::Object(props));
            }
            "items" => {
                out.insert(key.clone(), to_gemini_schema(value));
            }
            "required" | "enum" | "format" | "description" | "nullable" | "minItems"
            | "maxItems" => {
                out.insert(key.clone(), value.clone());
            }
            _ => {}
        }
    }

    Value::Object(out)
}
