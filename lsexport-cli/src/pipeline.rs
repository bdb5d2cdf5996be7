//! One export run: resolve the window, fetch, collapse threads, render, deliver.

use chrono::{DateTime, Utc};
use lsexport_core::{
    deduplicate_latest, dispatch, render_artifacts, ArtifactSink, Delivery, ExportConfig,
    ExportError, ExportParams, ExportStats, ExportWindow, LangSmithClient, LocalSink, S3Sink,
    S3Uploader,
};

/// What a successful export produced.
#[derive(Debug)]
pub struct ExportReport {
    pub window: ExportWindow,
    /// Runs returned by LangSmith before deduplication.
    pub fetched: usize,
    pub excluded_duplicates: usize,
    pub stats: ExportStats,
    pub deliveries: Vec<Delivery>,
}

/// Run a single export ending at `now`.
pub async fn run_export(
    config: &ExportConfig,
    params: &ExportParams,
    now: DateTime<Utc>,
) -> Result<ExportReport, ExportError> {
    // Resolve S3 settings before querying so a bad setup fails fast.
    let uploader = if params.output.s3 {
        Some(S3Uploader::new(&config.s3)?)
    } else {
        None
    };

    let window = ExportWindow::ending_at(now, params.hours)?;

    tracing::info!(
        output = %params.output,
        sessions = ?config.langsmith.session_ids,
        hours = params.hours,
        filter_name = ?config.langsmith.filter_name,
        start_time = %window.start_iso(),
        end_time = %window.end_iso(),
        debug_limit = ?params.debug_limit,
        "Querying LangSmith runs"
    );

    let client = LangSmithClient::new(config.langsmith.clone())?;
    let runs = client.fetch_all_runs(&window, params.debug_limit).await?;

    let dedup = deduplicate_latest(runs);
    let artifacts = render_artifacts(&dedup.runs, window.end)?;

    let mut sinks: Vec<Box<dyn ArtifactSink>> = Vec::new();
    if params.output.local {
        sinks.push(Box::new(LocalSink::new(config.output.resolved_dir())));
    }
    if let Some(uploader) = uploader {
        tracing::info!(bucket = uploader.bucket(), "S3 upload enabled");
        sinks.push(Box::new(S3Sink::new(uploader)));
    }

    let report = dispatch(&sinks, &artifacts).await;

    let stats = ExportStats::from_runs(&dedup.runs);
    stats.log();

    if !report.is_success() {
        return Err(ExportError::Delivery {
            failed: report.failures.len(),
            attempted: report.attempted(),
        });
    }

    Ok(ExportReport {
        window,
        fetched: dedup.before,
        excluded_duplicates: dedup.excluded,
        stats,
        deliveries: report.delivered,
    })
}
