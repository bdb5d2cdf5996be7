use thiserror::Error;

use crate::langsmith::QueryError;
use crate::s3::UploadError;
use crate::sink::SinkError;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("{failed} of {attempted} artifact deliveries failed")]
    Delivery { failed: usize, attempted: usize },
}
