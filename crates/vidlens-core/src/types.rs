use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Conversation session token, generated locally and passed to every backend call.
pub type SessionId = Uuid;

/// Identifier of a transcript produced by the ingestion pipeline.
///
/// Opaque: never parsed, only compared and forwarded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptId(pub String);

impl TranscriptId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TranscriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TranscriptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TranscriptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A point in time as seconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }

    /// Wall-clock time of day, as shown next to chat messages.
    pub fn time_of_day(&self) -> String {
        self.to_datetime().format("%H:%M:%S").to_string()
    }
}
