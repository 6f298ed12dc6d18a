use crate::image::ImageHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One message in the transcript. Turns are append-only and never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    /// Strip the timestamp, keeping only what is sent to the model as context
    pub fn as_prior(&self) -> PriorTurn {
        PriorTurn {
            speaker: self.speaker,
            text: self.text.clone(),
        }
    }
}

/// A turn as conversational context for the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Structured result of analyzing an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct AnalysisSummary {
    /// A concise description of the image
    pub summary: String,
    /// Key objects and features, most salient first
    pub tags: Vec<String>,
}

/// Lifecycle of a single controller operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationState {
    /// Nothing happened (preconditions not met)
    #[default]
    Idle,
    /// A remote call is outstanding
    Loading,
    /// Completed successfully
    Ready,
    /// Completed, but the failure was absorbed into a turn or flag
    Error,
}

/// Everything the front end renders.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub current_image: Option<ImageHandle>,
    pub turns: Vec<ConversationTurn>,
    pub busy: bool,
    pub analysis: Option<AnalysisSummary>,
    pub init_error: Option<String>,
    /// `Loading` while busy, otherwise how the last operation ended
    pub status: OperationState,
}
