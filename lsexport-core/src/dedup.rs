use std::collections::HashMap;

use crate::models::{ExportedRun, RunRecord};
use crate::thread;

/// Result of collapsing runs to one per conversation thread.
#[derive(Debug, Clone)]
pub struct DedupOutcome {
    pub runs: Vec<ExportedRun>,
    pub before: usize,
    /// Older runs dropped in favour of a later run of the same thread.
    pub excluded: usize,
}

/// Keep the latest run of every thread and enrich it with parsed ids.
///
/// Runs without a `thread_id` are keyed by their own id and never merged.
/// Unparseable `start_time` sorts earliest; on ties the first run seen wins.
/// Output keeps the order in which each thread first appeared.
pub fn deduplicate_latest(runs: Vec<RunRecord>) -> DedupOutcome {
    let before = runs.len();
    let mut index: HashMap<String, usize> = HashMap::with_capacity(runs.len());
    let mut kept: Vec<RunRecord> = Vec::with_capacity(runs.len());
    let mut excluded = 0usize;

    for run in runs {
        let key = match run.thread_id.as_deref().filter(|t| !t.is_empty()) {
            Some(thread_id) => format!("thread:{}", thread_id),
            None => format!("run:{}", run.id),
        };

        match index.get(&key) {
            None => {
                index.insert(key, kept.len());
                kept.push(run);
            }
            Some(&slot) => {
                excluded += 1;
                if run.started_at() > kept[slot].started_at() {
                    kept[slot] = run;
                }
            }
        }
    }

    tracing::info!(
        before,
        after = kept.len(),
        excluded,
        "Deduplicated runs by thread"
    );

    DedupOutcome {
        runs: kept.into_iter().map(thread::enrich).collect(),
        before,
        excluded,
    }
}
