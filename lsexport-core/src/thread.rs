//! Thread id parsing: `<user-id>-<lesson-id>`, split at the last hyphen so
//! user ids may themselves contain hyphens.

use crate::models::{ExportedRun, RunRecord};

pub fn parse_thread_id(thread_id: &str) -> Option<(String, String)> {
    let (user, lesson) = thread_id.rsplit_once('-')?;
    let (user, lesson) = (user.trim(), lesson.trim());

    if user.is_empty() || lesson.is_empty() {
        tracing::debug!(thread_id, "Could not parse thread_id into user and lesson ids");
        return None;
    }

    Some((user.to_string(), lesson.to_string()))
}

/// Attach the user and lesson ids parsed from the run's thread.
pub fn enrich(run: RunRecord) -> ExportedRun {
    let (user_id, lesson_id) = match run.thread_id.as_deref().and_then(parse_thread_id) {
        Some((user, lesson)) => (Some(user), Some(lesson)),
        None => (None, None),
    };

    ExportedRun {
        run,
        user_id,
        lesson_id,
    }
}
