//! Conversation state and the controller that owns it.

pub mod controller;
pub mod events;
pub mod models;
pub mod texts;

pub use controller::{ConversationController, ConversationControllerBuilder};
pub use events::ConversationEvent;
pub use models::{
    AnalysisSummary, ConversationState, ConversationTurn, OperationState, PriorTurn, Speaker,
};
