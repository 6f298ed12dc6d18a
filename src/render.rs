//! Plain-text rendering of the conversation state.
//!
//! The layout mirrors a two-pane view: the image pane (what is loaded, its tags,
//! any load notice) and the transcript pane. Nothing here is a stable format.

use crate::conversation::models::{
    AnalysisSummary, ConversationState, ConversationTurn, OperationState, Speaker,
};

/// Shown in the transcript pane before the first turn
pub const EMPTY_TRANSCRIPT_HINT: &str =
    "Once an image is loaded I can help you analyze its details, text, colors, or scene.";

/// Tags of the current analysis, in order
pub fn tag_chips(analysis: Option<&AnalysisSummary>) -> Vec<String> {
    analysis.map(|a| a.tags.clone()).unwrap_or_default()
}

pub fn render_turn(turn: &ConversationTurn) -> String {
    let label = match turn.speaker {
        Speaker::User => "you",
        Speaker::Assistant => "assistant",
    };
    format!("[{}] {}: {}", turn.created_at.format("%H:%M:%S"), label, turn.text)
}

pub fn render_image_pane(state: &ConversationState) -> String {
    let mut output = String::new();

    match &state.current_image {
        Some(image) => {
            output.push_str(&format!("Image: {} ({})\n", image.display_reference(), image.media_type()))
        }
        None => output.push_str("Image: waiting for input (/open <path|url>)\n"),
    }

    let chips = tag_chips(state.analysis.as_ref());
    if !chips.is_empty() {
        let line: Vec<String> = chips.iter().map(|tag| format!("[{}]", tag)).collect();
        output.push_str(&format!("Tags: {}\n", line.join(" ")));
    }

    if let Some(init_error) = &state.init_error {
        output.push_str(&format!("Notice: {}\n", init_error));
    }

    if state.status == OperationState::Loading {
        output.push_str("Extracting visual features...\n");
    }

    output
}

pub fn render_transcript(state: &ConversationState) -> String {
    if state.turns.is_empty() {
        return format!("{}\n", EMPTY_TRANSCRIPT_HINT);
    }

    let mut output = String::new();
    for turn in &state.turns {
        output.push_str(&render_turn(turn));
        output.push('\n');
    }
    output
}

/// Both panes, separated by a rule
pub fn render(state: &ConversationState) -> String {
    format!(
        "{}{}\n{}",
        render_image_pane(state),
        "-".repeat(60),
        render_transcript(state)
    )
}
