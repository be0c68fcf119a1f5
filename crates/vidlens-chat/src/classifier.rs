//! Utterance intent classifier.
//!
//! Maps raw user text to an [`Intent`] by case-insensitive keyword
//! containment. Agent keywords outrank retrieval keywords, which outrank the
//! open-question default.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::{AgentType, Classification, Intent};

// =============================================================================
// Keyword tables
// =============================================================================

static SUMMARIZE_KEYWORDS: &[&str] = &[
    "summary",
    "summarize",
    "tóm tắt",
    "tổng hợp",
    "tóm lược",
    "summerize",
];

static HIGHLIGHT_KEYWORDS: &[&str] = &[
    "highlight",
    "highlights",
    "điểm nổi bật",
    "phần quan trọng",
    "điểm chính",
];

static VIOLATION_KEYWORDS: &[&str] = &[
    "violation",
    "violations",
    "vi phạm",
    "kiểm duyệt",
    "chính sách",
];

static RETRIEVAL_KEYWORDS: &[&str] = &[
    "nội dung", "transcript", "video nói về", "trong video", "phần này",
    "thời điểm", "timestamp", "phút thứ", "giây thứ", "đoạn", "phần",
    "người nói", "tác giả", "diễn giả", "chi tiết", "giải thích thêm",
    "what does", "what is mentioned", "tell me about", "explain",
    "ở đâu", "khi nào", "như thế nào", "tại sao", "phân tích",
    "video", "miêu tả", "mô tả", "describe", "nói về", "về gì",
    "có nói", "có liên quan", "đề cập", "thảo luận", "react", "javascript",
    "python", "programming", "coding", "tutorial", "đang miêu tả",
];

const AGENT_CONFIDENCE: f32 = 0.9;
const RETRIEVAL_CONFIDENCE: f32 = 0.8;
const OPEN_CONFIDENCE: f32 = 0.7;

// =============================================================================
// Compiled keyword sets (compiled once, reused across calls)
// =============================================================================

struct KeywordPatterns {
    /// Tested in order; the first agent with a match wins.
    agents: Vec<(AgentType, Regex)>,
    retrieval: Regex,
}

fn keyword_regex(keywords: &[&str]) -> Regex {
    let alts: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
    Regex::new(&format!("(?i)(?:{})", alts.join("|"))).expect("Invalid keyword regex")
}

fn agent_keywords(agent: AgentType) -> &'static [&'static str] {
    match agent {
        AgentType::Summarize => SUMMARIZE_KEYWORDS,
        AgentType::Highlight => HIGHLIGHT_KEYWORDS,
        AgentType::Violation => VIOLATION_KEYWORDS,
    }
}

static KEYWORD_PATTERNS: LazyLock<KeywordPatterns> = LazyLock::new(|| KeywordPatterns {
    agents: AgentType::ALL
        .into_iter()
        .map(|agent| (agent, keyword_regex(agent_keywords(agent))))
        .collect(),
    retrieval: keyword_regex(RETRIEVAL_KEYWORDS),
});

// =============================================================================
// IntentClassifier
// =============================================================================

/// Rule-based utterance classifier. Stateless; every call is independent.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify an utterance.
    ///
    /// Total: text that matches nothing is an [`Intent::OpenQuestion`].
    pub fn classify(&self, text: &str) -> Classification {
        let pats = &*KEYWORD_PATTERNS;

        for (agent_type, re) in &pats.agents {
            if re.is_match(text) {
                return Classification {
                    intent: Intent::AgentAutomation {
                        agent_type: *agent_type,
                    },
                    confidence: AGENT_CONFIDENCE,
                };
            }
        }

        if pats.retrieval.is_match(text) {
            return Classification {
                intent: Intent::RetrievalQuestion,
                confidence: RETRIEVAL_CONFIDENCE,
            };
        }

        Classification {
            intent: Intent::OpenQuestion,
            confidence: OPEN_CONFIDENCE,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn intent_of(text: &str) -> Intent {
        IntentClassifier::new().classify(text).intent
    }

    fn agent(agent_type: AgentType) -> Intent {
        Intent::AgentAutomation { agent_type }
    }

    // ---- Agent automation ----

    #[test]
    fn test_summarize_keywords_any_case_and_position() {
        for text in [
            "summarize",
            "Please SUMMARIZE the talk",
            "can I get a summary?",
            "Tóm tắt video này",
            "TÓM TẮT giúp mình",
            "tổng hợp lại nội dung",
            "pls summerize",
        ] {
            assert_eq!(intent_of(text), agent(AgentType::Summarize), "{}", text);
        }
    }

    #[test]
    fn test_highlight_keywords() {
        assert_eq!(
            intent_of("What are the highlights?"),
            agent(AgentType::Highlight)
        );
        assert_eq!(
            intent_of("cho mình điểm nổi bật"),
            agent(AgentType::Highlight)
        );
        assert_eq!(
            intent_of("Liệt kê ĐIỂM CHÍNH"),
            agent(AgentType::Highlight)
        );
    }

    #[test]
    fn test_violation_keywords() {
        assert_eq!(
            intent_of("Are there any policy violations?"),
            agent(AgentType::Violation)
        );
        assert_eq!(
            intent_of("video có vi phạm gì không"),
            agent(AgentType::Violation)
        );
    }

    #[test]
    fn test_agent_ties_broken_by_enumeration_order() {
        assert_eq!(
            intent_of("highlight the violations then summarize"),
            agent(AgentType::Summarize)
        );
        assert_eq!(
            intent_of("violations and highlights"),
            agent(AgentType::Highlight)
        );
    }

    // ---- Priority ----

    #[test]
    fn test_agent_keywords_outrank_retrieval_keywords() {
        // "video" and "explain" are retrieval keywords.
        assert_eq!(
            intent_of("Explain the highlights of this video"),
            agent(AgentType::Highlight)
        );
    }

    #[test]
    fn test_retrieval_keywords() {
        for text in [
            "What is this video about?",
            "Explain the second part",
            "Describe the speaker",
            "What does he say at the timestamp 02:10?",
            "tell me about the python section",
            "Tác giả là ai?",
            "Người nói đề cập gì ở phút thứ 3",
        ] {
            assert_eq!(intent_of(text), Intent::RetrievalQuestion, "{}", text);
        }
    }

    #[test]
    fn test_unmatched_falls_through_to_open_question() {
        for text in ["hello", "How do I upload a file?", "", "   ", "🤖"] {
            assert_eq!(intent_of(text), Intent::OpenQuestion, "{:?}", text);
        }
    }

    // ---- Determinism & confidence ----

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = IntentClassifier::new();
        for text in [
            "summarize",
            "what is in the video",
            "good morning",
            "Highlights pls",
        ] {
            let first = classifier.classify(text);
            let _ = classifier.classify("something unrelated in between");
            let second = classifier.classify(text);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_confidence_per_category() {
        let classifier = IntentClassifier::new();
        assert_eq!(classifier.classify("summary").confidence, 0.9);
        assert_eq!(classifier.classify("transcript").confidence, 0.8);
        assert_eq!(classifier.classify("hi there").confidence, 0.7);
    }

    #[test]
    fn test_keywords_are_matched_literally() {
        // Regex metacharacters in input cannot widen a match.
        assert_eq!(intent_of("summ.ry"), Intent::OpenQuestion);
        assert_eq!(intent_of("(.*)"), Intent::OpenQuestion);
    }
}
