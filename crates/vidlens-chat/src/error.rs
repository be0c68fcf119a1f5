//! Error types for the conversation core.

use vidlens_core::types::TranscriptId;

use crate::backend::BackendError;
use crate::types::IngestionState;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("a turn is already in progress")]
    TurnInProgress,
    #[error("no transcript is active")]
    NoTranscript,
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("backend call timed out after {0} seconds")]
    Timeout(u64),
    #[error("state error: {0}")]
    StateError(String),
}

/// Errors from the transcript ingestion gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestionError {
    #[error("indexing already in progress for transcript {0}")]
    AlreadyInProgress(TranscriptId),
    #[error("invalid ingestion transition for transcript {0}: {1} -> {2}")]
    InvalidTransition(TranscriptId, IngestionState, IngestionState),
}
