use std::collections::HashSet;

use serde::Serialize;

use crate::models::ExportedRun;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub total_runs: usize,
    /// Distinct thread ids.
    pub conversations: usize,
    pub unique_users: usize,
    pub unique_lessons: usize,
}

impl ExportStats {
    pub fn from_runs(runs: &[ExportedRun]) -> Self {
        let mut threads = HashSet::new();
        let mut users = HashSet::new();
        let mut lessons = HashSet::new();

        for exported in runs {
            if let Some(thread_id) = exported.run.thread_id.as_deref().filter(|t| !t.is_empty()) {
                threads.insert(thread_id);
            }
            if let Some(user_id) = exported.user_id.as_deref() {
                users.insert(user_id);
            }
            if let Some(lesson_id) = exported.lesson_id.as_deref() {
                lessons.insert(lesson_id);
            }
        }

        Self {
            total_runs: runs.len(),
            conversations: threads.len(),
            unique_users: users.len(),
            unique_lessons: lessons.len(),
        }
    }

    pub fn log(&self) {
        tracing::info!("{}", "=".repeat(48));
        tracing::info!("EXPORT STATISTICS");
        tracing::info!("{}", "=".repeat(48));
        tracing::info!("Runs exported: {}", self.total_runs);
        tracing::info!("Conversations (unique thread_ids): {}", self.conversations);
        tracing::info!("Unique users (parsed from thread_ids): {}", self.unique_users);
        tracing::info!("Unique lessons (parsed from thread_ids): {}", self.unique_lessons);
        tracing::info!("{}", "=".repeat(48));
    }
}
