use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A root run as returned by the LangSmith runs query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub id: String,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Kept as returned; LangSmith omits the offset on some deployments.
    #[serde(default)]
    pub start_time: Option<String>,
    /// Conversation content.
    #[serde(default)]
    pub outputs: Option<serde_json::Value>,
}

impl RunRecord {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time.as_deref().and_then(parse_timestamp)
    }
}

/// A run after deduplication, carrying the ids parsed from its thread.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ExportedRun {
    #[serde(flatten)]
    pub run: RunRecord,
    pub user_id: Option<String>,
    pub lesson_id: Option<String>,
}

/// Parse RFC 3339, or naive ISO-8601 interpreted as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
