//! Capabilities the orchestrator consumes from the analysis backend.
//!
//! The orchestrator decides which capability to call and when; the backend
//! owns retrieval, generation and the analysis agents themselves.

use std::collections::HashMap;

use async_trait::async_trait;
use vidlens_core::types::{SessionId, TranscriptId};

use crate::types::{AgentType, AnalysisResult};

/// Errors reported by a [`ChatBackend`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// External conversational and analysis capabilities.
///
/// None of these calls are idempotent on the backend side. Callers are
/// responsible for single-flight guarantees.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Index a transcript for retrieval. Returns the backend's success flag.
    async fn ingest_transcript(&self, transcript_id: &TranscriptId) -> Result<bool, BackendError>;

    /// Answer from general knowledge.
    async fn ask_general(
        &self,
        session_id: SessionId,
        question: &str,
        include_history: bool,
    ) -> Result<String, BackendError>;

    /// Answer from the indexed transcript. Only valid after a successful ingestion.
    async fn ask_retrieval(
        &self,
        session_id: SessionId,
        question: &str,
        include_history: bool,
    ) -> Result<String, BackendError>;

    /// Run analysis tasks over a transcript.
    ///
    /// The returned map may hold a subset of the requested task types; only
    /// the returned keys are authoritative.
    async fn run_analysis_tasks(
        &self,
        transcript_id: &TranscriptId,
        task_types: &[AgentType],
    ) -> Result<HashMap<AgentType, AnalysisResult>, BackendError>;

    /// Drop the backend's conversational state for a session.
    async fn clear_history(&self, session_id: SessionId) -> Result<bool, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            BackendError::Http("connection refused".to_string()).to_string(),
            "request failed: connection refused"
        );
        assert_eq!(BackendError::Status(500).to_string(), "unexpected status 500");
        assert_eq!(
            BackendError::Decode("missing field `response`".to_string()).to_string(),
            "invalid response: missing field `response`"
        );
        assert_eq!(
            BackendError::Rejected("Transcript not found".to_string()).to_string(),
            "request rejected: Transcript not found"
        );
    }
}
