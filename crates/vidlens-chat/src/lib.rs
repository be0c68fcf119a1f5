//! Conversation orchestration for transcript chat.
//!
//! Classifies user utterances, gates retrieval questions on transcript
//! ingestion, caches analysis task results, and keeps the ordered message
//! history of the conversation.

pub mod backend;
pub mod cache;
pub mod classifier;
pub mod error;
pub mod format;
pub mod gate;
pub mod history;
pub mod orchestrator;
pub mod types;

pub use backend::{BackendError, ChatBackend};
pub use cache::AnalysisTaskCache;
pub use classifier::IntentClassifier;
pub use error::{ChatError, IngestionError};
pub use gate::TranscriptIngestionGate;
pub use history::MessageHistory;
pub use orchestrator::{ConversationOrchestrator, Timeouts};
pub use types::{
    AgentType, AnalysisResult, Classification, HighlightItem, IngestOutcome, IngestionState,
    Intent, Message, Role, RunAllReport, TaskEvent, TurnPhase, Utterance, ViolationItem,
};
pub use vidlens_core::config::ChatConfig;
