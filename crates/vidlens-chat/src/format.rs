//! Reply texts shown in the conversation.
//!
//! Renders cached analysis results and the fixed notices of the chat flow.
//! Results use light markdown (`**bold**`, `*italic*`).

use crate::types::{AgentType, AnalysisResult, HighlightItem, RunAllReport, ViolationItem};

pub const GREETING: &str = "Hello! I'm your AI assistant. I can help you analyze and discuss the processed transcript. Feel free to ask questions about the content, or type keywords like \"summary\", \"highlights\", or \"violations\" to automatically run analysis!";
pub const CLEARED_GREETING: &str = "History has been cleared. Welcome back!";

pub const UPLOAD_FIRST: &str = "Please upload the transcript before using the analysis feature.";
pub const NOT_INDEXED: &str = "Transcript has not been added to the vector database yet. Please wait for the processing to complete.";
pub const INDEXING_FAILED: &str = "Questions about the transcript content are not available because adding it to the vector database failed. Please upload the transcript again.";
pub const NO_RETRIEVAL_ANSWER: &str = "Sorry, I couldn't find any relevant information in the transcript.";
pub const APOLOGY: &str = "Sorry, I encountered an error while processing your request. Please try again.";
pub const TRANSCRIPT_CHANGED: &str = "The active transcript changed before this answer arrived, so it was discarded. Please ask again.";

pub const INGESTED_NOTICE: &str = "✅ Transcript has been added to the vector database. You can now ask questions related to the transcript content.";
pub const INGEST_FAILED_NOTICE: &str = "❌ Error adding transcript to vector database.";

pub const NO_HIGHLIGHTS: &str = "No highlights found in this video.";
pub const NO_VIOLATIONS: &str = "✅ Don't worry, no violations found.";

/// Renders analysis results and task acknowledgements.
#[derive(Debug, Clone)]
pub struct ReplyFormatter {
    /// Number of highlights listed before the "more" note.
    pub highlight_preview_limit: usize,
}

impl Default for ReplyFormatter {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ReplyFormatter {
    pub fn new(highlight_preview_limit: usize) -> Self {
        Self {
            highlight_preview_limit,
        }
    }

    /// Reply synthesized from a cached result.
    pub fn analysis_result(&self, result: &AnalysisResult) -> String {
        match result {
            AnalysisResult::Summary(text) => format!("**Summary:**\n\n{}", text),
            AnalysisResult::Highlights(items) => self.highlights(items),
            AnalysisResult::Violations(items) => self.violations(items),
        }
    }

    /// Acknowledgement sent when a task is dispatched or still running.
    pub fn processing(&self, agent_type: AgentType) -> &'static str {
        match agent_type {
            AgentType::Summarize => "🔄 Summarizing...",
            AgentType::Highlight => "🔄 Extracting highlights... This may take a few seconds.",
            AgentType::Violation => "🔄 Checking for policy violations... Please wait.",
        }
    }

    /// Summary of a "run all" request: what is ready now and what is pending.
    pub fn run_all(&self, report: &RunAllReport) -> String {
        let pending: Vec<&str> = report.pending().map(|a| label(*a)).collect();
        let ready: Vec<&str> = report.ready.iter().map(|a| label(*a)).collect();

        if pending.is_empty() {
            return format!("✅ All analyses are ready: {}.", ready.join(", "));
        }

        let mut lines = Vec::new();
        if !ready.is_empty() {
            lines.push(format!("✅ Ready now: {}.", ready.join(", ")));
        }
        lines.push(format!(
            "🔄 Running: {}. Ask again once they finish.",
            pending.join(", ")
        ));
        lines.join("\n")
    }

    fn highlights(&self, items: &[HighlightItem]) -> String {
        if items.is_empty() {
            return NO_HIGHLIGHTS.to_string();
        }

        let shown = &items[..items.len().min(self.highlight_preview_limit)];
        let body = shown
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}. **{}**: {}", i + 1, h.timestamp, h.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        let more = if items.len() > self.highlight_preview_limit {
            "\n\n*And many more highlights...*"
        } else {
            ""
        };

        format!(
            "✨ **Highlights ({} parts):**\n\n{}{}",
            items.len(),
            body,
            more
        )
    }

    fn violations(&self, items: &[ViolationItem]) -> String {
        if items.is_empty() {
            return NO_VIOLATIONS.to_string();
        }

        let body = items
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}. **{}**: {}", i + 1, v.violation, v.explanation))
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "⚠️ **Detected {} potential violations:**\n\n{}",
            items.len(),
            body
        )
    }
}

/// Display name of a task's result.
pub fn label(agent_type: AgentType) -> &'static str {
    match agent_type {
        AgentType::Summarize => "summary",
        AgentType::Highlight => "highlights",
        AgentType::Violation => "violations",
    }
}
