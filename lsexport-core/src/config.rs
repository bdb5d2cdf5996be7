use std::fmt;
use std::path::PathBuf;

use config::{Config, ConfigBuilder, File};
use serde::Deserialize;

use crate::error::ExportError;

pub const DEFAULT_CONFIG_PATH: &str = "lsexport.toml";
pub const DEFAULT_LANGSMITH_ENDPOINT: &str = "https://api.smith.langchain.com";

/// Environment variables and the settings they override.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("LANGSMITH_API_KEY", "langsmith.api_key"),
    ("LANGSMITH_ENDPOINT", "langsmith.endpoint"),
    ("LS_FILTER_NAME", "langsmith.filter_name"),
    ("LS_PAGE_SIZE", "langsmith.page_size"),
    ("S3_BUCKET_NAME", "s3.bucket"),
    ("AWS_REGION", "s3.region"),
    ("AWS_ACCESS_KEY_ID", "s3.access_key_id"),
    ("AWS_SECRET_ACCESS_KEY", "s3.secret_access_key"),
    ("AWS_SESSION_TOKEN", "s3.session_token"),
    ("S3_ENDPOINT", "s3.endpoint"),
    ("S3_KEY_PREFIX", "s3.key_prefix"),
    ("OUTPUT_DIR", "output.dir"),
    ("LOG_LEVEL", "log_level"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    pub langsmith: LangSmithConfig,
    pub s3: S3Config,
    pub output: OutputConfig,
    pub log_level: String,
}

#[derive(Deserialize, Clone)]
pub struct LangSmithConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub session_ids: Vec<String>,
    pub endpoint: String,
    pub filter_name: Option<String>,
    pub page_size: u32,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl fmt::Debug for LangSmithConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LangSmithConfig")
            .field("api_key", &"<redacted>")
            .field("session_ids", &self.session_ids)
            .field("endpoint", &self.endpoint)
            .field("filter_name", &self.filter_name)
            .field("page_size", &self.page_size)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct S3Config {
    pub bucket: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Overrides the regional AWS endpoint (S3-compatible stores, tests).
    /// Objects are then addressed path-style.
    pub endpoint: Option<String>,
    pub key_prefix: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &redact(&self.access_key_id))
            .field("secret_access_key", &redact(&self.secret_access_key))
            .field("session_token", &redact(&self.session_token))
            .field("endpoint", &self.endpoint)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

/// Everything needed to sign an S3 request.
#[derive(Clone)]
pub struct S3Credentials {
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl S3Config {
    /// Resolve the bucket and AWS keys, failing on the first one missing.
    pub fn credentials(&self) -> Result<S3Credentials, ExportError> {
        let bucket = self
            .bucket
            .clone()
            .ok_or(ExportError::MissingSetting("S3_BUCKET_NAME"))?;
        let access_key_id = self
            .access_key_id
            .clone()
            .ok_or(ExportError::MissingSetting("AWS_ACCESS_KEY_ID"))?;
        let secret_access_key = self
            .secret_access_key
            .clone()
            .ok_or(ExportError::MissingSetting("AWS_SECRET_ACCESS_KEY"))?;

        Ok(S3Credentials {
            bucket,
            region: self.region.clone(),
            access_key_id,
            secret_access_key,
            session_token: self.session_token.clone(),
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: String,
}

impl OutputConfig {
    /// Output directory with `~` and `$VAR` expanded.
    pub fn resolved_dir(&self) -> PathBuf {
        match shellexpand::full(&self.dir) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                tracing::warn!(dir = %self.dir, error = %e, "Could not expand output dir, using it verbatim");
                PathBuf::from(&self.dir)
            }
        }
    }
}

impl ExportConfig {
    /// Load from `path` (optional file) with process environment overrides.
    pub fn load(path: &str) -> Result<Self, ExportError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load with an explicit environment lookup.
    pub fn load_with_env<F>(path: &str, env: F) -> Result<Self, ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = defaults()?.add_source(File::with_name(path).required(false));

        for &(var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(key, lookup(var))?;
        }

        let session_ids = lookup("LS_SESSION_IDS").map(|raw| split_session_ids(&raw));
        builder = builder.set_override_option("langsmith.session_ids", session_ids)?;

        let config: ExportConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ExportError> {
        if self.langsmith.api_key.trim().is_empty() {
            return Err(ExportError::MissingSetting("LANGSMITH_API_KEY"));
        }
        if self.langsmith.session_ids.is_empty() {
            return Err(ExportError::MissingSetting("LS_SESSION_IDS"));
        }
        if self.langsmith.page_size == 0 {
            return Err(ExportError::InvalidParameter(
                "langsmith.page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ExportError> {
    Ok(Config::builder()
        .set_default("langsmith.endpoint", DEFAULT_LANGSMITH_ENDPOINT)?
        .set_default("langsmith.page_size", 100)?
        .set_default("langsmith.max_retries", 3)?
        .set_default("langsmith.retry_delay_ms", 1000)?
        .set_default("langsmith.timeout_seconds", 60)?
        .set_default("s3.region", "us-east-1")?
        .set_default("output.dir", "langsmith-exports")?
        .set_default("log_level", "info")?)
}

/// Split a comma-separated `LS_SESSION_IDS` value, dropping blanks.
pub fn split_session_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
