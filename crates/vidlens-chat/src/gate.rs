//! Transcript ingestion gate.
//!
//! Tracks, per transcript, whether it has been indexed for retrieval and
//! guarantees that at most one indexing operation is started for it:
//! Idle -> Indexing -> Indexed/Failed

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use vidlens_core::types::TranscriptId;

use crate::error::IngestionError;
use crate::types::IngestionState;

/// Validate that an ingestion state transition is allowed.
///
/// Valid transitions:
/// - Idle -> Indexing
/// - Indexing -> Indexed
/// - Indexing -> Failed
pub fn validate_transition(
    transcript_id: &TranscriptId,
    from: IngestionState,
    to: IngestionState,
) -> Result<(), IngestionError> {
    match (from, to) {
        (IngestionState::Idle, IngestionState::Indexing)
        | (IngestionState::Indexing, IngestionState::Indexed)
        | (IngestionState::Indexing, IngestionState::Failed) => Ok(()),
        (IngestionState::Indexing, IngestionState::Indexing) => {
            Err(IngestionError::AlreadyInProgress(transcript_id.clone()))
        }
        _ => Err(IngestionError::InvalidTransition(
            transcript_id.clone(),
            from,
            to,
        )),
    }
}

/// Per-transcript ingestion state machine.
#[derive(Debug, Default)]
pub struct TranscriptIngestionGate {
    states: Mutex<HashMap<TranscriptId, IngestionState>>,
}

impl TranscriptIngestionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the single indexing slot for a transcript.
    ///
    /// Fails with `AlreadyInProgress` while another indexing operation is in
    /// flight, and with `InvalidTransition` once the state has settled.
    pub fn begin_indexing(&self, transcript_id: &TranscriptId) -> Result<(), IngestionError> {
        self.transition(transcript_id, IngestionState::Indexing)
    }

    pub fn mark_indexed(&self, transcript_id: &TranscriptId) -> Result<(), IngestionError> {
        self.transition(transcript_id, IngestionState::Indexed)
    }

    pub fn mark_failed(&self, transcript_id: &TranscriptId) -> Result<(), IngestionError> {
        self.transition(transcript_id, IngestionState::Failed)
    }

    /// Current state. A never-seen transcript is `Idle`.
    pub fn state(&self, transcript_id: &TranscriptId) -> IngestionState {
        self.lock()
            .get(transcript_id)
            .copied()
            .unwrap_or_default()
    }

    /// True iff the transcript is `Indexed`.
    pub fn is_queryable(&self, transcript_id: &TranscriptId) -> bool {
        self.state(transcript_id) == IngestionState::Indexed
    }

    /// Re-arm a `Failed` transcript so it can be ingested again.
    ///
    /// Used when a transcript is (re)activated. `Indexing` and `Indexed`
    /// are left alone; returns the state after the call.
    pub fn reset(&self, transcript_id: &TranscriptId) -> IngestionState {
        let mut states = self.lock();
        match states.get(transcript_id).copied().unwrap_or_default() {
            IngestionState::Failed => {
                states.insert(transcript_id.clone(), IngestionState::Idle);
                tracing::debug!(transcript_id = %transcript_id, "Failed ingestion re-armed");
                IngestionState::Idle
            }
            state => state,
        }
    }

    fn transition(
        &self,
        transcript_id: &TranscriptId,
        to: IngestionState,
    ) -> Result<(), IngestionError> {
        let mut states = self.lock();
        let from = states.get(transcript_id).copied().unwrap_or_default();
        validate_transition(transcript_id, from, to)?;
        states.insert(transcript_id.clone(), to);
        tracing::debug!(transcript_id = %transcript_id, %from, %to, "Ingestion state changed");
        Ok(())
    }

    // The map holds plain values, so a poisoned lock still has consistent data.
    fn lock(&self) -> MutexGuard<'_, HashMap<TranscriptId, IngestionState>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }
}
