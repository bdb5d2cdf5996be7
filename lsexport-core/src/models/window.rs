use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use crate::error::ExportError;

/// The `[end - hours, end]` range a single export covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExportWindow {
    pub fn ending_at(end: DateTime<Utc>, hours: f64) -> Result<Self, ExportError> {
        if !hours.is_finite() || hours <= 0.0 {
            return Err(ExportError::InvalidParameter(format!(
                "hours must be a positive number, got {}",
                hours
            )));
        }

        let millis = (hours * 3_600_000.0).round();
        let span = Duration::try_milliseconds(millis as i64).ok_or_else(|| {
            ExportError::InvalidParameter(format!("hours value {} is out of range", hours))
        })?;
        let start = end.checked_sub_signed(span).ok_or_else(|| {
            ExportError::InvalidParameter(format!("hours value {} is out of range", hours))
        })?;

        Ok(Self { start, end })
    }

    /// ISO-8601 with second precision and a `Z` suffix, as the runs API expects.
    pub fn start_iso(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    pub fn end_iso(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}
