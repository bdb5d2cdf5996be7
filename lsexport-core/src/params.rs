use std::fmt;
use std::str::FromStr;

use crate::error::ExportError;

pub const DEFAULT_HOURS: f64 = 24.0;

/// Where the rendered artifacts go. At least one destination is always set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    pub local: bool,
    pub s3: bool,
}

impl OutputMode {
    pub const JSON: Self = Self {
        local: true,
        s3: false,
    };
    pub const S3: Self = Self {
        local: false,
        s3: true,
    };
    pub const BOTH: Self = Self {
        local: true,
        s3: true,
    };
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::S3
    }
}

impl FromStr for OutputMode {
    type Err = ExportError;

    /// Accepts comma-separated `json` / `s3`; unknown options are ignored with a warning.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mode = OutputMode {
            local: false,
            s3: false,
        };

        for opt in s.split(',').map(|o| o.trim().to_ascii_lowercase()) {
            match opt.as_str() {
                "json" => mode.local = true,
                "s3" => mode.s3 = true,
                "" => {}
                other => tracing::warn!(option = other, "Unknown output option, ignoring"),
            }
        }

        if !mode.local && !mode.s3 {
            return Err(ExportError::InvalidParameter(format!(
                "output must include json and/or s3, got '{}'",
                s
            )));
        }

        Ok(mode)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.local, self.s3) {
            (true, true) => write!(f, "json,s3"),
            (true, false) => write!(f, "json"),
            (false, true) => write!(f, "s3"),
            (false, false) => write!(f, "none"),
        }
    }
}

/// Per-invocation inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportParams {
    pub hours: f64,
    pub output: OutputMode,
    /// Caps the number of exported runs; `None` exports everything.
    pub debug_limit: Option<usize>,
}
