use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::ExportedRun;

const FILE_PREFIX: &str = "langchain-runs";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Every field including conversation content.
    Full,
    /// Metadata only; never carries `outputs`.
    Summary,
}

impl ArtifactKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Full => "full",
            ArtifactKind::Summary => "summary",
        }
    }

    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}.txt",
            FILE_PREFIX,
            self.label(),
            at.format(TIMESTAMP_FORMAT)
        )
    }
}

/// One rendered output file, ready for any sink.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub body: String,
    pub run_count: usize,
}

#[derive(Serialize)]
struct FullEntry<'a> {
    #[serde(flatten)]
    summary: SummaryEntry<'a>,
    outputs: Option<&'a serde_json::Value>,
}

impl<'a> From<&'a ExportedRun> for FullEntry<'a> {
    fn from(exported: &'a ExportedRun) -> Self {
        Self {
            summary: SummaryEntry::from(exported),
            outputs: exported.run.outputs.as_ref(),
        }
    }
}

#[derive(Serialize)]
struct SummaryEntry<'a> {
    id: &'a str,
    trace_id: Option<&'a str>,
    thread_id: Option<&'a str>,
    session_id: Option<&'a str>,
    name: Option<&'a str>,
    start_time: Option<&'a str>,
    user_id: Option<&'a str>,
    lesson_id: Option<&'a str>,
}

impl<'a> From<&'a ExportedRun> for SummaryEntry<'a> {
    fn from(exported: &'a ExportedRun) -> Self {
        let run = &exported.run;
        Self {
            id: &run.id,
            trace_id: run.trace_id.as_deref(),
            thread_id: run.thread_id.as_deref(),
            session_id: run.session_id.as_deref(),
            name: run.name.as_deref(),
            start_time: run.start_time.as_deref(),
            user_id: exported.user_id.as_deref(),
            lesson_id: exported.lesson_id.as_deref(),
        }
    }
}

/// Render the full and summary artifacts, both stamped with `at`.
pub fn render_artifacts(
    runs: &[ExportedRun],
    at: DateTime<Utc>,
) -> Result<[Artifact; 2], serde_json::Error> {
    let full_entries: Vec<FullEntry<'_>> = runs.iter().map(FullEntry::from).collect();
    let full = serde_json::to_string_pretty(&full_entries)?;

    let summary_entries: Vec<SummaryEntry<'_>> = runs.iter().map(SummaryEntry::from).collect();
    let summary = serde_json::to_string_pretty(&summary_entries)?;

    Ok([
        Artifact {
            kind: ArtifactKind::Full,
            file_name: ArtifactKind::Full.file_name(at),
            body: full,
            run_count: runs.len(),
        },
        Artifact {
            kind: ArtifactKind::Summary,
            file_name: ArtifactKind::Summary.file_name(at),
            body: summary,
            run_count: runs.len(),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunRecord;
    use crate::thread::enrich;
    use chrono::TimeZone;

    fn exported(id: &str, content: &str) -> ExportedRun {
        enrich(RunRecord {
            id: id.to_string(),
            trace_id: Some(format!("trace-{}", id)),
            thread_id: Some("alice-lesson1".to_string()),
            session_id: Some("session-a".to_string()),
            name: Some("tutor".to_string()),
            start_time: Some("2025-03-01T12:00:00Z".to_string()),
            outputs: Some(serde_json::json!({
                "messages": [{ "role": "assistant", "content": content }]
            })),
        })
    }

    #[test]
    fn test_file_names_use_24_hour_clock() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 17, 5, 59).unwrap();
        assert_eq!(
            ArtifactKind::Full.file_name(at),
            "langchain-runs-full-2025-03-01-17-05.txt"
        );
        assert_eq!(
            ArtifactKind::Summary.file_name(at),
            "langchain-runs-summary-2025-03-01-17-05.txt"
        );
    }

    #[test]
    fn test_full_includes_content_and_summary_omits_it() {
        let runs = vec![exported("r1", "The mitochondria is the powerhouse")];
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let [full, summary] = render_artifacts(&runs, at).unwrap();

        assert_eq!(full.kind, ArtifactKind::Full);
        assert!(full.body.contains("The mitochondria is the powerhouse"));
        assert!(full.body.contains("\"outputs\""));

        assert_eq!(summary.kind, ArtifactKind::Summary);
        assert!(!summary.body.contains("mitochondria"));
        assert!(!summary.body.contains("\"outputs\""));

        let parsed: Vec<serde_json::Value> = serde_json::from_str(&summary.body).unwrap();
        assert_eq!(parsed[0]["id"], "r1");
        assert_eq!(parsed[0]["user_id"], "alice");
        assert_eq!(parsed[0]["lesson_id"], "lesson1");
        assert_eq!(parsed[0]["session_id"], "session-a");
    }

    #[test]
    fn test_full_entries_list_parsed_ids_before_content() {
        let runs = vec![exported("r1", "hello")];
        let [full, _] = render_artifacts(&runs, Utc::now()).unwrap();

        let keys = [
            "\"id\"",
            "\"trace_id\"",
            "\"thread_id\"",
            "\"session_id\"",
            "\"name\"",
            "\"start_time\"",
            "\"user_id\"",
            "\"lesson_id\"",
            "\"outputs\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|key| full.body.find(key).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", full.body);
    }

    #[test]
    fn test_non_ascii_content_kept_verbatim() {
        let runs = vec![exported("r1", "שלום עולם")];
        let at = Utc::now();
        let [full, _] = render_artifacts(&runs, at).unwrap();
        assert!(full.body.contains("שלום עולם"));
    }

    #[test]
    fn test_empty_export_renders_empty_arrays() {
        let at = Utc::now();
        let [full, summary] = render_artifacts(&[], at).unwrap();
        assert_eq!(full.body, "[]");
        assert_eq!(summary.body, "[]");
        assert_eq!(full.run_count, 0);
    }
}
