//! Conversation orchestrator: central coordinator wiring classifier, gate,
//! cache and history.
//!
//! Each utterance runs Received -> Classified -> Dispatching -> Replied
//! (or Failed). Only one turn runs at a time; analysis tasks run in the
//! background and report through the cache and the task event channel.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use vidlens_core::config::{BackendConfig, ChatConfig};
use vidlens_core::types::{SessionId, TranscriptId};

use crate::backend::{BackendError, ChatBackend};
use crate::cache::AnalysisTaskCache;
use crate::classifier::IntentClassifier;
use crate::error::ChatError;
use crate::format::{self, ReplyFormatter};
use crate::gate::TranscriptIngestionGate;
use crate::history::MessageHistory;
use crate::types::{
    AgentType, IngestOutcome, IngestionState, Intent, Message, Role, RunAllReport, TaskEvent,
    TurnPhase, Utterance,
};

/// Per-capability time limits for backend calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub ingest: Duration,
    pub analysis: Duration,
}

impl From<&BackendConfig> for Timeouts {
    fn from(config: &BackendConfig) -> Self {
        Self {
            request: config.request_timeout(),
            ingest: config.ingest_timeout(),
            analysis: config.analysis_timeout(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&BackendConfig::default())
    }
}

/// The transcript questions and tasks are currently addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveTranscript {
    id: TranscriptId,
    epoch: u64,
}

#[derive(Debug, Default)]
struct TranscriptSlot {
    active: Option<TranscriptId>,
    epoch: u64,
}

#[derive(Debug, Default)]
struct TurnState {
    phase: Option<TurnPhase>,
    /// Notices raised while a turn was dispatching, appended after its reply.
    deferred: Vec<(Role, String)>,
}

enum DispatchOutcome {
    Started,
    AlreadyRunning,
    Cached,
    NoTranscript,
}

/// Decides, per utterance, which backend capability to invoke and records
/// the conversation.
pub struct ConversationOrchestrator {
    classifier: IntentClassifier,
    gate: TranscriptIngestionGate,
    cache: Arc<AnalysisTaskCache>,
    history: MessageHistory,
    formatter: ReplyFormatter,
    backend: Arc<dyn ChatBackend>,
    transcript: Mutex<TranscriptSlot>,
    turn: Mutex<TurnState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<TaskEvent>,
    timeouts: Timeouts,
    config: ChatConfig,
}

impl ConversationOrchestrator {
    /// Create an orchestrator with default backend timeouts.
    pub fn new(backend: Arc<dyn ChatBackend>, config: ChatConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            classifier: IntentClassifier::new(),
            gate: TranscriptIngestionGate::new(),
            cache: Arc::new(AnalysisTaskCache::new()),
            history: MessageHistory::new(format::GREETING),
            formatter: ReplyFormatter::new(config.highlight_preview_limit),
            backend,
            transcript: Mutex::new(TranscriptSlot::default()),
            turn: Mutex::new(TurnState::default()),
            tasks: Mutex::new(Vec::new()),
            events,
            timeouts: Timeouts::default(),
            config,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    // -----------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------

    /// Handle one user utterance and return the assistant reply.
    ///
    /// The user message is recorded before classification; exactly one
    /// assistant message follows it, an apology if the backend call fails.
    pub async fn handle_utterance(&self, text: &str) -> Result<Message, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.chars().count() > self.config.max_message_length {
            return Err(ChatError::MessageTooLong(self.config.max_message_length));
        }

        let turn = self.begin_turn()?;
        let utterance = Utterance::new(text);
        self.history.append(Role::User, utterance.text.as_str(), None);

        let classification = self.classifier.classify(&utterance.text);
        turn.advance(TurnPhase::Classified);
        let intent = classification.intent;
        tracing::debug!(
            intent = %intent,
            confidence = classification.confidence,
            received_at = utterance.received_at.0,
            "Utterance classified"
        );

        turn.advance(TurnPhase::Dispatching);
        let reply = match intent {
            Intent::AgentAutomation { agent_type } => Ok(self.request_analysis(agent_type)),
            Intent::RetrievalQuestion => self.answer_from_transcript(&utterance.text).await,
            Intent::OpenQuestion => self.answer_general(&utterance.text).await,
        };

        let (content, phase) = match reply {
            Ok(content) => (content, TurnPhase::Replied),
            Err(e) => {
                tracing::warn!(error = %e, intent = %intent, "Dispatch failed");
                (format::APOLOGY.to_string(), TurnPhase::Failed)
            }
        };

        Ok(turn.complete(content, intent, phase))
    }

    fn request_analysis(&self, agent_type: AgentType) -> String {
        if self.active_transcript().is_none() {
            return format::UPLOAD_FIRST.to_string();
        }

        if let Some(result) = self.cache.get(agent_type) {
            tracing::debug!(agent_type = %agent_type, "Answering from cached analysis");
            return self.formatter.analysis_result(&result);
        }

        match self.dispatch(agent_type, false) {
            DispatchOutcome::NoTranscript => format::UPLOAD_FIRST.to_string(),
            DispatchOutcome::Started | DispatchOutcome::AlreadyRunning => {
                self.formatter.processing(agent_type).to_string()
            }
            DispatchOutcome::Cached => match self.cache.get(agent_type) {
                Some(result) => self.formatter.analysis_result(&result),
                None => self.formatter.processing(agent_type).to_string(),
            },
        }
    }

    async fn answer_from_transcript(&self, question: &str) -> Result<String, ChatError> {
        let Some(active) = self.active() else {
            return Ok(format::NOT_INDEXED.to_string());
        };

        match self.gate.state(&active.id) {
            IngestionState::Indexed => {}
            IngestionState::Failed => return Ok(format::INDEXING_FAILED.to_string()),
            IngestionState::Idle | IngestionState::Indexing => {
                return Ok(format::NOT_INDEXED.to_string())
            }
        }

        let answer = bounded(
            self.timeouts.request,
            self.backend.ask_retrieval(
                self.history.session_id(),
                question,
                self.config.include_history,
            ),
        )
        .await?;

        if !self.is_current(&active) {
            tracing::info!(
                transcript_id = %active.id,
                "Discarding retrieval answer for a replaced transcript"
            );
            return Ok(format::TRANSCRIPT_CHANGED.to_string());
        }

        if answer.trim().is_empty() {
            Ok(format::NO_RETRIEVAL_ANSWER.to_string())
        } else {
            Ok(answer)
        }
    }

    async fn answer_general(&self, question: &str) -> Result<String, ChatError> {
        let answer = bounded(
            self.timeouts.request,
            self.backend.ask_general(
                self.history.session_id(),
                question,
                self.config.include_history,
            ),
        )
        .await?;

        if answer.trim().is_empty() {
            Ok(format::APOLOGY.to_string())
        } else {
            Ok(answer)
        }
    }

    // -----------------------------------------------------------------
    // Transcript lifecycle
    // -----------------------------------------------------------------

    /// Make `transcript_id` the active transcript.
    ///
    /// A different transcript clears the analysis cache and invalidates
    /// in-flight work for the previous one. A `Failed` ingestion entry is
    /// re-armed; an `Indexed` one stays queryable. Returns false if it was
    /// already active.
    pub fn set_transcript(&self, transcript_id: impl Into<TranscriptId>) -> bool {
        let transcript_id = transcript_id.into();
        let mut slot = lock(&self.transcript);
        if slot.active.as_ref() == Some(&transcript_id) {
            return false;
        }

        let previous = slot.active.replace(transcript_id.clone());
        slot.epoch += 1;
        // Cleared under the slot lock so no dispatch can pair the new
        // transcript with the previous cache epoch.
        self.cache.clear_all();
        drop(slot);

        let state = self.gate.reset(&transcript_id);
        tracing::info!(
            transcript_id = %transcript_id,
            previous = ?previous.as_ref().map(|p| p.as_str()),
            ingestion = %state,
            "Active transcript changed"
        );
        true
    }

    /// Index the active transcript for retrieval, at most once.
    ///
    /// Repeated triggers while indexing is in flight, or after it settled,
    /// are suppressed without calling the backend.
    pub async fn ingest_active_transcript(&self) -> IngestOutcome {
        let Some(active) = self.active() else {
            return IngestOutcome::NoTranscript;
        };

        if let Err(e) = self.gate.begin_indexing(&active.id) {
            tracing::debug!(error = %e, "Ingestion trigger suppressed");
            return IngestOutcome::Suppressed;
        }

        tracing::info!(transcript_id = %active.id, "Ingesting transcript");
        let succeeded = match bounded(
            self.timeouts.ingest,
            self.backend.ingest_transcript(&active.id),
        )
        .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(transcript_id = %active.id, "Backend reported ingestion failure");
                false
            }
            Err(e) => {
                tracing::warn!(transcript_id = %active.id, error = %e, "Ingestion failed");
                false
            }
        };

        let marked = if succeeded {
            self.gate.mark_indexed(&active.id)
        } else {
            self.gate.mark_failed(&active.id)
        };
        if let Err(e) = marked {
            tracing::error!(error = %e, "Ingestion gate rejected settlement");
        }

        // Judged by id: switching away and back during indexing still
        // announces the outcome for the transcript that is active again.
        if self.active_transcript().as_ref() != Some(&active.id) {
            tracing::info!(transcript_id = %active.id, "Ingestion settled for a replaced transcript");
            return IngestOutcome::Stale;
        }

        if succeeded {
            self.notify(Role::System, format::INGESTED_NOTICE.to_string());
            IngestOutcome::Indexed
        } else {
            self.notify(Role::System, format::INGEST_FAILED_NOTICE.to_string());
            IngestOutcome::Failed
        }
    }

    /// Activate a transcript and trigger its ingestion.
    pub async fn load_transcript(&self, transcript_id: impl Into<TranscriptId>) -> IngestOutcome {
        self.set_transcript(transcript_id);
        self.ingest_active_transcript().await
    }

    // -----------------------------------------------------------------
    // Analysis tasks
    // -----------------------------------------------------------------

    /// Dispatch every analysis task that is neither cached nor running.
    ///
    /// Records a system message stating which parts are ready and which are
    /// pending. Must be called from within a Tokio runtime.
    pub fn run_all(&self) -> Result<RunAllReport, ChatError> {
        if self.active_transcript().is_none() {
            return Err(ChatError::NoTranscript);
        }

        let mut report = RunAllReport::default();
        for agent_type in AgentType::ALL {
            if self.cache.has(agent_type) {
                report.ready.push(agent_type);
                continue;
            }
            match self.dispatch(agent_type, false) {
                DispatchOutcome::Started => report.dispatched.push(agent_type),
                DispatchOutcome::AlreadyRunning => report.in_flight.push(agent_type),
                DispatchOutcome::Cached => report.ready.push(agent_type),
                DispatchOutcome::NoTranscript => return Err(ChatError::NoTranscript),
            }
        }

        tracing::info!(
            ready = report.ready.len(),
            dispatched = report.dispatched.len(),
            in_flight = report.in_flight.len(),
            "Run all requested"
        );
        self.notify(Role::System, self.formatter.run_all(&report));
        Ok(report)
    }

    /// Re-run one analysis task even if a result is cached; the new result
    /// replaces it. Returns false if the task is already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn rerun(&self, agent_type: AgentType) -> Result<bool, ChatError> {
        match self.dispatch(agent_type, true) {
            DispatchOutcome::Started => Ok(true),
            DispatchOutcome::AlreadyRunning | DispatchOutcome::Cached => Ok(false),
            DispatchOutcome::NoTranscript => Err(ChatError::NoTranscript),
        }
    }

    fn dispatch(&self, agent_type: AgentType, force: bool) -> DispatchOutcome {
        // The transcript and the cache epoch are read under the slot lock,
        // which set_transcript also holds while it clears the cache.
        let slot = lock(&self.transcript);
        let Some(transcript_id) = slot.active.clone() else {
            return DispatchOutcome::NoTranscript;
        };
        let Some(epoch) = self.cache.try_begin(agent_type) else {
            tracing::debug!(agent_type = %agent_type, "Analysis already running");
            return DispatchOutcome::AlreadyRunning;
        };
        if !force && self.cache.has(agent_type) {
            self.cache.finish(epoch, agent_type);
            return DispatchOutcome::Cached;
        }
        drop(slot);

        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let events = self.events.clone();
        let limit = self.timeouts.analysis;

        tracing::info!(transcript_id = %transcript_id, agent_type = %agent_type, "Dispatching analysis task");
        let handle = tokio::spawn(async move {
            let task_types = [agent_type];
            let outcome = bounded(limit, backend.run_analysis_tasks(&transcript_id, &task_types)).await;

            let event = match outcome {
                Ok(results) => {
                    let returned_requested = results.contains_key(&agent_type);
                    let mut stale = cache.epoch() != epoch;
                    for (_, result) in results {
                        if !cache.put_if_current(epoch, result) {
                            stale = true;
                        }
                    }
                    if stale {
                        TaskEvent::Discarded {
                            transcript_id,
                            agent_type,
                        }
                    } else if returned_requested {
                        TaskEvent::Completed {
                            transcript_id,
                            agent_type,
                        }
                    } else {
                        TaskEvent::Failed {
                            transcript_id,
                            agent_type,
                            error: "backend returned no result for the task".to_string(),
                        }
                    }
                }
                Err(e) => TaskEvent::Failed {
                    transcript_id,
                    agent_type,
                    error: e.to_string(),
                },
            };
            cache.finish(epoch, agent_type);

            match &event {
                TaskEvent::Completed { .. } => {
                    tracing::info!(agent_type = %agent_type, "Analysis task completed")
                }
                TaskEvent::Failed { error, .. } => {
                    tracing::warn!(agent_type = %agent_type, error = %error, "Analysis task failed")
                }
                TaskEvent::Discarded { transcript_id, .. } => tracing::info!(
                    agent_type = %agent_type,
                    transcript_id = %transcript_id,
                    "Discarding analysis result for a replaced transcript"
                ),
            }
            // No subscribers is fine.
            let _ = events.send(event);
        });
        self.track(handle);
        DispatchOutcome::Started
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = lock(&self.tasks);
        tasks.retain(|h| !h.is_finished());
        tasks.push(handle);
    }

    /// Wait for every background analysis task dispatched so far.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *lock(&self.tasks));
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Analysis task panicked");
                }
            }
        }
    }

    /// Subscribe to background task settlements.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    // -----------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------

    /// Reset the conversation to a fresh greeting under a new session id.
    ///
    /// The backend's history for the old session is dropped on a best-effort
    /// basis. Cached analysis and ingestion state are kept: they belong to
    /// the transcript, not the session.
    pub async fn clear(&self) -> Result<SessionId, ChatError> {
        let turn = self.begin_turn()?;
        let old_session = self.history.session_id();

        match bounded(
            self.timeouts.request,
            self.backend.clear_history(old_session),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(session_id = %old_session, "Backend did not clear history"),
            Err(e) => tracing::warn!(session_id = %old_session, error = %e, "Failed to clear backend history"),
        }

        let new_session = self.history.clear(format::CLEARED_GREETING);
        drop(turn);
        tracing::info!(old_session = %old_session, new_session = %new_session, "Chat history cleared");
        Ok(new_session)
    }

    // -----------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------

    pub fn history(&self) -> &MessageHistory {
        &self.history
    }

    pub fn cache(&self) -> &AnalysisTaskCache {
        &self.cache
    }

    pub fn gate(&self) -> &TranscriptIngestionGate {
        &self.gate
    }

    pub fn session_id(&self) -> SessionId {
        self.history.session_id()
    }

    pub fn active_transcript(&self) -> Option<TranscriptId> {
        lock(&self.transcript).active.clone()
    }

    pub fn ingestion_state(&self) -> Option<IngestionState> {
        self.active_transcript().map(|id| self.gate.state(&id))
    }

    /// Phase of the running turn, or of the last one if none is running.
    pub fn current_phase(&self) -> Option<TurnPhase> {
        lock(&self.turn).phase
    }

    pub fn is_busy(&self) -> bool {
        self.current_phase().is_some_and(|p| !p.is_terminal())
    }

    // -- Private helpers --

    fn active(&self) -> Option<ActiveTranscript> {
        let slot = lock(&self.transcript);
        slot.active.as_ref().map(|id| ActiveTranscript {
            id: id.clone(),
            epoch: slot.epoch,
        })
    }

    fn is_current(&self, active: &ActiveTranscript) -> bool {
        lock(&self.transcript).epoch == active.epoch
    }

    fn begin_turn(&self) -> Result<TurnGuard<'_>, ChatError> {
        let mut state = self
            .turn
            .lock()
            .map_err(|e| ChatError::StateError(format!("turn lock poisoned: {}", e)))?;
        if state.phase.is_some_and(|p| !p.is_terminal()) {
            return Err(ChatError::TurnInProgress);
        }
        state.phase = Some(TurnPhase::Received);
        Ok(TurnGuard {
            turn: &self.turn,
            history: &self.history,
        })
    }

    /// Append a message now, or after the running turn's reply.
    fn notify(&self, role: Role, content: String) {
        let mut state = lock(&self.turn);
        if state.phase.is_some_and(|p| !p.is_terminal()) {
            state.deferred.push((role, content));
        } else {
            self.history.append(role, content, None);
        }
    }
}

/// Holds the single turn slot until the turn is completed or dropped.
struct TurnGuard<'a> {
    turn: &'a Mutex<TurnState>,
    history: &'a MessageHistory,
}

impl TurnGuard<'_> {
    fn advance(&self, phase: TurnPhase) {
        lock(self.turn).phase = Some(phase);
        tracing::debug!(phase = %phase, "Turn phase changed");
    }

    /// Record the reply, settle the turn and flush deferred notices.
    fn complete(self, content: String, intent: Intent, phase: TurnPhase) -> Message {
        let mut state = lock(self.turn);
        let message = self.history.append(Role::Assistant, content, Some(intent));
        state.phase = Some(phase);
        for (role, notice) in state.deferred.drain(..) {
            self.history.append(role, notice, None);
        }
        drop(state);
        message
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.turn);
        if state.phase.is_some_and(|p| !p.is_terminal()) {
            state.phase = None;
        }
        for (role, notice) in state.deferred.drain(..) {
            self.history.append(role, notice, None);
        }
    }
}

/// Run a backend call under a time limit.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ChatError::Timeout(limit.as_secs())),
    }
}

// State behind these locks is updated in single assignments, so a poisoned
// lock still holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Tests
// =============================================================================
