pub mod config;
pub mod conversation;
pub mod error;
pub mod image;
pub mod llm;
pub mod render;
pub mod vision;

pub use error::{Result, VislensError};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::config::{AppConfig, Backend};
    pub use crate::conversation::{
        AnalysisSummary, ConversationController, ConversationEvent, ConversationState,
        ConversationTurn, OperationState, Speaker,
    };
    pub use crate::error::{Result, VislensError};
    pub use crate::image::{ImageHandle, ImageLoader, ImageSource};
    pub use crate::llm::gateways::{GeminiGateway, OllamaGateway};
    pub use crate::llm::{CompletionConfig, LlmBroker, LlmGateway, LlmMessage, MessageRole};
    pub use crate::vision::{HistoryPolicy, VisionAssistant, VisionClient};
}
