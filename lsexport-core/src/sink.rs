//! Artifact sinks: where rendered exports end up
//!
//! - **LocalSink**: writes into the output directory (kept as CI artifacts)
//! - **S3Sink**: uploads to the configured bucket
//!
//! `dispatch` hands every artifact to every sink and keeps going past
//! failures so one rejected upload never hides the others.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::artifact::Artifact;
use crate::s3::{S3Uploader, UploadError};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

/// Where an artifact landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Local(PathBuf),
    S3(String),
}

#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn deliver(&self, artifact: &Artifact) -> Result<Delivery, SinkError>;

    /// Sink name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// LocalSink
// ============================================================================

#[derive(Debug, Clone)]
pub struct LocalSink {
    dir: PathBuf,
}

impl LocalSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactSink for LocalSink {
    async fn deliver(&self, artifact: &Artifact) -> Result<Delivery, SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(&artifact.file_name);
        tokio::fs::write(&path, artifact.body.as_bytes())
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(
            runs = artifact.run_count,
            kind = artifact.kind.label(),
            path = %path.display(),
            "Wrote artifact"
        );
        Ok(Delivery::Local(path))
    }

    fn name(&self) -> &str {
        "local"
    }
}

// ============================================================================
// S3Sink
// ============================================================================

#[derive(Debug, Clone)]
pub struct S3Sink {
    uploader: S3Uploader,
}

impl S3Sink {
    pub fn new(uploader: S3Uploader) -> Self {
        Self { uploader }
    }
}

#[async_trait]
impl ArtifactSink for S3Sink {
    async fn deliver(&self, artifact: &Artifact) -> Result<Delivery, SinkError> {
        let uri = self
            .uploader
            .put_object(&artifact.file_name, artifact.body.as_bytes())
            .await?;
        Ok(Delivery::S3(uri))
    }

    fn name(&self) -> &str {
        "s3"
    }
}

// ============================================================================
// Dispatch
// ============================================================================

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub delivered: Vec<Delivery>,
    /// `(sink name, artifact file name, error)` for every failed delivery.
    pub failures: Vec<(String, String, SinkError)>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn local_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.delivered.iter().filter_map(|d| match d {
            Delivery::Local(path) => Some(path),
            Delivery::S3(_) => None,
        })
    }

    pub fn s3_uris(&self) -> impl Iterator<Item = &str> {
        self.delivered.iter().filter_map(|d| match d {
            Delivery::S3(uri) => Some(uri.as_str()),
            Delivery::Local(_) => None,
        })
    }
}

/// Deliver every artifact to every sink, in sink order.
pub async fn dispatch(sinks: &[Box<dyn ArtifactSink>], artifacts: &[Artifact]) -> DispatchReport {
    let mut report = DispatchReport::default();

    for sink in sinks {
        for artifact in artifacts {
            match sink.deliver(artifact).await {
                Ok(delivery) => report.delivered.push(delivery),
                Err(e) => {
                    tracing::error!(
                        sink = sink.name(),
                        file = %artifact.file_name,
                        error = %e,
                        "Artifact delivery failed"
                    );
                    report
                        .failures
                        .push((sink.name().to_string(), artifact.file_name.clone(), e));
                }
            }
        }
    }

    report
}
