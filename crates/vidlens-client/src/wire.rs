//! Request and response bodies of the analysis backend's REST API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vidlens_chat::{AgentType, AnalysisResult, HighlightItem, ViolationItem};

#[derive(Debug, Serialize)]
pub(crate) struct AddTranscriptRequest<'a> {
    pub transcript_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskRequest<'a> {
    pub session_id: String,
    pub question: &'a str,
    pub include_history: bool,
}

/// `{success, message?}` returned by ingestion and history clearing.
#[derive(Debug, Deserialize)]
pub(crate) struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AskResponse {
    #[serde(default)]
    pub response: String,
}

/// Error body of a rejected request.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AgentsResponse {
    #[serde(default)]
    pub results: AgentResults,
}

/// Result fields keyed by result name. A task the backend did not run, or
/// that produced nothing, is null or absent.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AgentResults {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub highlights: Option<Vec<HighlightItem>>,
    #[serde(default)]
    pub violations: Option<Vec<ViolationItem>>,
}

impl AgentResults {
    pub fn into_map(self) -> HashMap<AgentType, AnalysisResult> {
        let mut results = HashMap::new();
        if let Some(summary) = self.summary {
            results.insert(AgentType::Summarize, AnalysisResult::Summary(summary));
        }
        if let Some(highlights) = self.highlights {
            results.insert(AgentType::Highlight, AnalysisResult::Highlights(highlights));
        }
        if let Some(violations) = self.violations {
            results.insert(AgentType::Violation, AnalysisResult::Violations(violations));
        }
        results
    }
}
