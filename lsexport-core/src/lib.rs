pub mod artifact;
pub mod config;
pub mod dedup;
pub mod error;
pub mod langsmith;
pub mod models;
pub mod params;
pub mod s3;
pub mod sink;
pub mod stats;
pub mod thread;

pub use artifact::{render_artifacts, Artifact, ArtifactKind};
pub use crate::config::{ExportConfig, LangSmithConfig, OutputConfig, S3Config};
pub use dedup::{deduplicate_latest, DedupOutcome};
pub use error::ExportError;
pub use langsmith::{LangSmithClient, QueryError};
pub use models::{ExportWindow, ExportedRun, RunRecord};
pub use params::{ExportParams, OutputMode};
pub use s3::{S3Uploader, UploadError};
pub use sink::{dispatch, ArtifactSink, Delivery, DispatchReport, LocalSink, S3Sink, SinkError};
pub use stats::ExportStats;
