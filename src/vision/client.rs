use crate::conversation::models::{AnalysisSummary, PriorTurn, Speaker};
use crate::error::{Result, VislensError};
use crate::image::ImageHandle;
use crate::llm::{CompletionConfig, LlmBroker, LlmMessage};
use crate::vision::prompts::{
    FALLBACK_SUMMARY, IMAGE_CONTEXT_NOTE, NO_RESPONSE_PLACEHOLDER, SUMMARY_INSTRUCTION,
    VISUAL_INDEXER_PERSONA,
};
use async_trait::async_trait;
use tracing::{info, warn};

/// Result of asking the model for a structured summary.
///
/// A transport or API failure is an `Err` from [`VisionClient::summarize`]; a
/// response that arrived but did not fit the expected shape is `Degraded`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    Structured(AnalysisSummary),
    Degraded { reason: String },
}

impl SummaryOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SummaryOutcome::Degraded { .. })
    }

    /// The summary to show: the parsed one, or the fixed fallback.
    pub fn into_summary(self) -> AnalysisSummary {
        match self {
            SummaryOutcome::Structured(summary) => summary,
            SummaryOutcome::Degraded { .. } => AnalysisSummary {
                summary: FALLBACK_SUMMARY.to_string(),
                tags: Vec::new(),
            },
        }
    }
}

/// Whether earlier turns are replayed to the model on each question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryPolicy {
    /// Send every prior turn ahead of the question
    #[default]
    Full,
    /// Send only the latest question
    LatestOnly,
}

/// The two questions this application asks of a vision model
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Produce a summary and tags for an image
    async fn summarize(&self, image: &ImageHandle) -> Result<SummaryOutcome>;

    /// Answer a free-text question about an image
    async fn respond(
        &self,
        image: &ImageHandle,
        question: &str,
        prior_turns: &[PriorTurn],
    ) -> Result<String>;
}

/// [`VisionClient`] backed by an [`LlmBroker`]
pub struct VisionAssistant {
    broker: LlmBroker,
    history: HistoryPolicy,
    config: CompletionConfig,
}

impl VisionAssistant {
    pub fn new(broker: LlmBroker) -> Self {
        Self {
            broker,
            history: HistoryPolicy::default(),
            config: CompletionConfig::default(),
        }
    }

    pub fn with_history(mut self, history: HistoryPolicy) -> Self {
        self.history = history;
        self
    }

    pub fn with_completion_config(mut self, config: CompletionConfig) -> Self {
        self.config = config;
        self
    }

    fn question_messages(
        &self,
        image: &ImageHandle,
        question: &str,
        prior_turns: &[PriorTurn],
    ) -> Vec<LlmMessage> {
        let mut messages = vec![LlmMessage::system(VISUAL_INDEXER_PERSONA)];

        match self.history {
            HistoryPolicy::Full if !prior_turns.is_empty() => {
                messages.push(
                    LlmMessage::user(IMAGE_CONTEXT_NOTE).with_images(vec![image.attachment()]),
                );
                messages.extend(prior_turns.iter().map(|turn| match turn.speaker {
                    Speaker::User => LlmMessage::user(&turn.text),
                    Speaker::Assistant => LlmMessage::assistant(&turn.text),
                }));
                messages.push(LlmMessage::user(question));
            }
            _ => {
                messages.push(LlmMessage::user(question).with_images(vec![image.attachment()]));
            }
        }

        messages
    }
}

#[async_trait]
impl VisionClient for VisionAssistant {
    async fn summarize(&self, image: &ImageHandle) -> Result<SummaryOutcome> {
        info!("Summarizing image {}", image.display_reference());

        let messages =
            vec![LlmMessage::user(SUMMARY_INSTRUCTION).with_images(vec![image.attachment()])];

        match self
            .broker
            .generate_object::<AnalysisSummary>(&messages, Some(self.config.clone()))
            .await
        {
            Ok(summary) => Ok(SummaryOutcome::Structured(summary)),
            Err(VislensError::SerializationError(e)) => {
                warn!("Failed to parse analysis result: {}", e);
                Ok(SummaryOutcome::Degraded {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn respond(
        &self,
        image: &ImageHandle,
        question: &str,
        prior_turns: &[PriorTurn],
    ) -> Result<String> {
        let messages = self.question_messages(image, question, prior_turns);

        let answer = self.broker.generate(&messages, Some(self.config.clone())).await?;

        if answer.is_empty() {
            Ok(NO_RESPONSE_PLACEHOLDER.to_string())
        } else {
            Ok(answer)
        }
    }
}
