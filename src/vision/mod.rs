//! The inference client: summary and question answering over a vision model.

pub mod client;
pub mod prompts;

pub use client::{HistoryPolicy, SummaryOutcome, VisionAssistant, VisionClient};
