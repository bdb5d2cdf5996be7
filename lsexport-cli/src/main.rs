use anyhow::Context;
use clap::Parser;
use lsexport_core::config::DEFAULT_CONFIG_PATH;
use lsexport_core::params::DEFAULT_HOURS;
use lsexport_core::{Delivery, ExportConfig, ExportParams, OutputMode};
use tracing_subscriber::{fmt, EnvFilter};

use lsexport_cli::pipeline;

/// Export LangSmith runs to timestamped files and optionally upload them to S3.
#[derive(Parser, Debug)]
#[command(
    name = "lsexport",
    author,
    version,
    about,
    after_help = "Examples:\n  lsexport --output json --hours 1 --debug-limit 5\n  lsexport --output s3\n  lsexport --output json,s3 --hours 168"
)]
struct Args {
    /// Time window in hours to fetch runs for
    #[arg(long, env = "LS_HOURS", default_value_t = DEFAULT_HOURS)]
    hours: f64,

    /// Output destinations (comma-separated): json, s3
    #[arg(short, long, env = "LS_OUTPUT", default_value_t = OutputMode::default().to_string())]
    output: String,

    /// Stop after N runs (for test invocations)
    #[arg(long, visible_alias = "debug", env = "LS_DEBUG_LIMIT", value_name = "N")]
    debug_limit: Option<usize>,

    /// Optional TOML settings file; environment variables override it
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level or filter directive (overrides LOG_LEVEL; RUST_LOG wins over both)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (CI passes real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = ExportConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration (file: {})", args.config))?;

    // Init logging
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone())
        .to_lowercase();
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let params = ExportParams {
        hours: args.hours,
        output: args.output.parse::<OutputMode>()?,
        debug_limit: args.debug_limit,
    };

    tracing::info!(
        output = %params.output,
        s3_upload = params.output.s3,
        "Starting LangSmith export"
    );

    let report = pipeline::run_export(&config, &params, chrono::Utc::now())
        .await
        .context("Export failed")?;

    for delivery in &report.deliveries {
        match delivery {
            Delivery::Local(path) => tracing::info!(path = %path.display(), "Saved locally"),
            Delivery::S3(uri) => tracing::info!(uri = %uri, "Saved to S3"),
        }
    }

    tracing::info!(
        fetched = report.fetched,
        exported = report.stats.total_runs,
        excluded_duplicates = report.excluded_duplicates,
        "Export completed successfully"
    );

    Ok(())
}
