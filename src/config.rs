//! Process configuration read from the environment (and `.env`).

use crate::error::{Result, VislensError};
use crate::image::ImageSource;
use crate::llm::gateways::{GeminiConfig, GeminiGateway, OllamaGateway};
use crate::llm::LlmGateway;
use crate::vision::HistoryPolicy;
use std::sync::Arc;
use tracing::warn;

/// Default image candidates, probed in order at startup
pub const DEFAULT_IMAGE_CANDIDATES: &str = "./photo.jpg,./cover.jpg";

/// Which hosted model service answers questions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Ollama,
    Gemini,
}

impl Backend {
    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::Ollama => "qwen3-vl:30b",
            Backend::Gemini => "gemini-2.5-flash",
        }
    }

    /// Build the gateway for this backend from its environment settings
    pub fn gateway(&self) -> Result<Arc<dyn LlmGateway>> {
        match self {
            Backend::Ollama => Ok(Arc::new(OllamaGateway::new()?)),
            Backend::Gemini => gemini_gateway(GeminiConfig::default()),
        }
    }
}

/// Without a key only a warning is logged; each request then fails with `ConfigError`.
fn gemini_gateway(config: GeminiConfig) -> Result<Arc<dyn LlmGateway>> {
    if config.api_key.is_empty() {
        warn!("GEMINI_API_KEY (or API_KEY) is not set; Gemini requests will fail");
    }
    Ok(Arc::new(GeminiGateway::with_config(config)?))
}

impl std::str::FromStr for Backend {
    type Err = VislensError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Backend::Ollama),
            "gemini" => Ok(Backend::Gemini),
            other => Err(VislensError::ConfigError(format!("unknown backend: {}", other))),
        }
    }
}

fn parse_history(s: &str) -> Result<HistoryPolicy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "full" => Ok(HistoryPolicy::Full),
        "latest" => Ok(HistoryPolicy::LatestOnly),
        other => Err(VislensError::ConfigError(format!("unknown history policy: {}", other))),
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: Backend,
    pub model: String,
    pub default_images: Vec<ImageSource>,
    pub history: HistoryPolicy,
    pub temperature: Option<f32>,
}

impl AppConfig {
    /// Read settings from `VISLENS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match lookup("VISLENS_BACKEND") {
            Some(value) => value.parse()?,
            None => Backend::Ollama,
        };

        let model = lookup("VISLENS_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| backend.default_model().to_string());

        let default_images = ImageSource::parse_list(
            &lookup("VISLENS_DEFAULT_IMAGES").unwrap_or_else(|| DEFAULT_IMAGE_CANDIDATES.to_string()),
        );

        let history = match lookup("VISLENS_HISTORY") {
            Some(value) => parse_history(&value)?,
            None => HistoryPolicy::default(),
        };

        let temperature = lookup("VISLENS_TEMPERATURE")
            .map(|value| {
                value.trim().parse::<f32>().map_err(|_| {
                    VislensError::ConfigError(format!("invalid temperature: {}", value))
                })
            })
            .transpose()?;

        Ok(Self {
            backend,
            model,
            default_images,
            history,
            temperature,
        })
    }
}
