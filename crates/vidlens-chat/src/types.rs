//! Domain types for the conversation core.

use std::fmt;

use serde::{Deserialize, Serialize};
use vidlens_core::types::{Timestamp, TranscriptId};

// =============================================================================
// Intents
// =============================================================================

/// Analysis agents that can be triggered from the conversation.
///
/// Declaration order is the tie-break order used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Summarize,
    Highlight,
    Violation,
}

impl AgentType {
    /// Every agent type, in tie-break order.
    pub const ALL: [AgentType; 3] = [
        AgentType::Summarize,
        AgentType::Highlight,
        AgentType::Violation,
    ];

    /// Task name used when requesting the analysis.
    pub fn task_name(&self) -> &'static str {
        match self {
            AgentType::Summarize => "summarize",
            AgentType::Highlight => "highlight",
            AgentType::Violation => "violation",
        }
    }

    /// Key under which the backend reports this task's result.
    pub fn result_key(&self) -> &'static str {
        match self {
            AgentType::Summarize => "summary",
            AgentType::Highlight => "highlights",
            AgentType::Violation => "violations",
        }
    }

    pub fn from_result_key(key: &str) -> Option<Self> {
        AgentType::ALL.into_iter().find(|a| a.result_key() == key)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_name())
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" | "summary" => Ok(AgentType::Summarize),
            "highlight" | "highlights" => Ok(AgentType::Highlight),
            "violation" | "violations" => Ok(AgentType::Violation),
            _ => Err(format!("Unknown agent type: {}", s)),
        }
    }
}

/// How an utterance is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Run (or reuse) an analysis task over the active transcript.
    AgentAutomation { agent_type: AgentType },
    /// Answer from the indexed transcript content.
    #[serde(rename = "rag_question")]
    RetrievalQuestion,
    /// Answer from general knowledge, not gated by ingestion.
    #[serde(rename = "general_chat")]
    OpenQuestion,
}

impl Intent {
    pub fn tag(&self) -> &'static str {
        match self {
            Intent::AgentAutomation { .. } => "agent_automation",
            Intent::RetrievalQuestion => "rag_question",
            Intent::OpenQuestion => "general_chat",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Intent::AgentAutomation { agent_type } => write!(f, "agent_automation:{}", agent_type),
            other => f.write_str(other.tag()),
        }
    }
}

/// Classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// Informational only; never used for branching.
    pub confidence: f32,
}

/// Raw user input as received by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub received_at: Timestamp,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Timestamp::now(),
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One entry of the conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Monotonic across the lifetime of the history, including clears.
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

// =============================================================================
// Ingestion
// =============================================================================

/// Retrieval indexing state of one transcript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    #[default]
    Idle,
    Indexing,
    Indexed,
    Failed,
}

impl fmt::Display for IngestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionState::Idle => write!(f, "idle"),
            IngestionState::Indexing => write!(f, "indexing"),
            IngestionState::Indexed => write!(f, "indexed"),
            IngestionState::Failed => write!(f, "failed"),
        }
    }
}

/// Result of an explicit ingestion trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The transcript is now queryable.
    Indexed,
    /// The backend rejected or failed the ingestion; the state is sticky.
    Failed,
    /// Indexing was already running or had already settled; nothing was sent.
    Suppressed,
    /// No transcript is active.
    NoTranscript,
    /// The active transcript changed before ingestion settled.
    Stale,
}

// =============================================================================
// Analysis results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightItem {
    pub timestamp: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationItem {
    pub violation: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Output of one analysis task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnalysisResult {
    Summary(String),
    Highlights(Vec<HighlightItem>),
    Violations(Vec<ViolationItem>),
}

impl AnalysisResult {
    pub fn agent_type(&self) -> AgentType {
        match self {
            AnalysisResult::Summary(_) => AgentType::Summarize,
            AnalysisResult::Highlights(_) => AgentType::Highlight,
            AnalysisResult::Violations(_) => AgentType::Violation,
        }
    }
}

// =============================================================================
// Orchestration
// =============================================================================

/// Lifecycle of a single user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    Received,
    Classified,
    Dispatching,
    Replied,
    Failed,
}

impl TurnPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnPhase::Replied | TurnPhase::Failed)
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnPhase::Received => write!(f, "received"),
            TurnPhase::Classified => write!(f, "classified"),
            TurnPhase::Dispatching => write!(f, "dispatching"),
            TurnPhase::Replied => write!(f, "replied"),
            TurnPhase::Failed => write!(f, "failed"),
        }
    }
}

/// Settlement of a background analysis task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// The result was written to the cache.
    Completed {
        transcript_id: TranscriptId,
        agent_type: AgentType,
    },
    /// The backend call failed, timed out or returned no result for the task.
    Failed {
        transcript_id: TranscriptId,
        agent_type: AgentType,
        error: String,
    },
    /// The result arrived after the active transcript changed and was dropped.
    Discarded {
        transcript_id: TranscriptId,
        agent_type: AgentType,
    },
}

/// What a "run all" request did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAllReport {
    /// Already cached; answered immediately.
    pub ready: Vec<AgentType>,
    /// Newly dispatched by this request.
    pub dispatched: Vec<AgentType>,
    /// Dispatched earlier and still running.
    pub in_flight: Vec<AgentType>,
}

impl RunAllReport {
    pub fn pending(&self) -> impl Iterator<Item = &AgentType> {
        self.dispatched.iter().chain(self.in_flight.iter())
    }
}
