//! Append-only conversation log.

use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;
use vidlens_core::error::Result;
use vidlens_core::types::{SessionId, Timestamp};

use crate::types::{Intent, Message, Role};

#[derive(Debug)]
struct HistoryInner {
    messages: Vec<Message>,
    next_id: u64,
    session_id: SessionId,
}

impl HistoryInner {
    fn push(&mut self, role: Role, content: String, intent: Option<Intent>) -> Message {
        let message = Message {
            id: self.next_id,
            role,
            content,
            created_at: Timestamp::now(),
            intent,
        };
        self.next_id += 1;
        self.messages.push(message.clone());
        message
    }
}

/// Ordered messages of the current session.
///
/// Entries are never edited, reordered or removed individually; `clear` is
/// the only reset and starts a new session.
#[derive(Debug)]
pub struct MessageHistory {
    inner: Mutex<HistoryInner>,
}

impl MessageHistory {
    /// Start a session whose history holds a single system greeting.
    pub fn new(greeting: &str) -> Self {
        let mut inner = HistoryInner {
            messages: Vec::new(),
            next_id: 1,
            session_id: Uuid::new_v4(),
        };
        inner.push(Role::System, greeting.to_string(), None);
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn append(&self, role: Role, content: impl Into<String>, intent: Option<Intent>) -> Message {
        self.lock().push(role, content.into(), intent)
    }

    /// Snapshot of every message in conversation order.
    pub fn all(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn last(&self) -> Option<Message> {
        self.lock().messages.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_id(&self) -> SessionId {
        self.lock().session_id
    }

    /// Replace the history with a single greeting and start a new session.
    ///
    /// Message ids keep increasing across clears.
    pub fn clear(&self, greeting: &str) -> SessionId {
        let mut inner = self.lock();
        inner.messages.clear();
        inner.session_id = Uuid::new_v4();
        inner.push(Role::System, greeting.to_string(), None);
        inner.session_id
    }

    /// Serialize the current session as a JSON transcript.
    pub fn to_json(&self) -> Result<String> {
        let inner = self.lock();
        let doc = serde_json::json!({
            "session_id": inner.session_id,
            "messages": inner.messages,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    // Appends are all-or-nothing, so a poisoned lock still has consistent data.
    fn lock(&self) -> MutexGuard<'_, HistoryInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgentType;

    #[test]
    fn test_new_history_has_greeting() {
        let history = MessageHistory::new("Hello!");
        let all = history.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].role, Role::System);
        assert_eq!(all[0].content, "Hello!");
        assert_eq!(all[0].id, 1);
        assert_ne!(history.session_id(), Uuid::nil());
    }

    #[test]
    fn test_append_preserves_order_and_monotonic_ids() {
        let history = MessageHistory::new("hi");
        history.append(Role::User, "first", None);
        history.append(Role::Assistant, "reply", Some(Intent::OpenQuestion));
        history.append(Role::User, "second", None);

        let all = history.all();
        assert_eq!(all.len(), 4);
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "first", "reply", "second"]);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(all[2].intent, Some(Intent::OpenQuestion));
    }

    #[test]
    fn test_append_returns_stored_message() {
        let history = MessageHistory::new("hi");
        let msg = history.append(Role::User, "question", None);
        assert_eq!(history.last(), Some(msg));
    }

    #[test]
    fn test_clear_resets_to_single_greeting_and_new_session() {
        let history = MessageHistory::new("hi");
        let old_session = history.session_id();
        history.append(Role::User, "a", None);
        history.append(Role::Assistant, "b", None);

        let new_session = history.clear("History has been cleared. Welcome back!");
        assert_ne!(new_session, old_session);
        assert_eq!(history.session_id(), new_session);

        let all = history.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].role, Role::System);
        assert_eq!(all[0].content, "History has been cleared. Welcome back!");
    }

    #[test]
    fn test_ids_stay_monotonic_across_clear() {
        let history = MessageHistory::new("hi");
        let before = history.append(Role::User, "a", None);
        history.clear("again");
        let after = history.append(Role::User, "b", None);
        assert!(after.id > before.id);
    }

    #[test]
    fn test_to_json_contains_session_and_messages() {
        let history = MessageHistory::new("hi");
        history.append(
            Role::Assistant,
            "**Summary:**\n\nS",
            Some(Intent::AgentAutomation {
                agent_type: AgentType::Summarize,
            }),
        );
        let json: serde_json::Value = serde_json::from_str(&history.to_json().unwrap()).unwrap();
        assert_eq!(
            json["session_id"].as_str().unwrap(),
            history.session_id().to_string()
        );
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["intent"]["type"], "agent_automation");
    }
}
