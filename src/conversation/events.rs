use crate::conversation::models::{AnalysisSummary, ConversationTurn};

/// A state change published by the conversation controller.
///
/// Front ends subscribe to these to redraw without polling.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    BusyChanged(bool),
    ImageChanged { display_reference: String },
    TurnAppended(ConversationTurn),
    AnalysisUpdated(AnalysisSummary),
    InitErrorChanged(Option<String>),
}
