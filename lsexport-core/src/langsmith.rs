//! LangSmith runs client: paginated queries over `/api/v1/runs/query`
//!
//! Fetches root runs for the configured sessions inside an export window,
//! following the `cursors.next` token until the service reports no further
//! pages or the debug limit is reached.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::LangSmithConfig;
use crate::models::{ExportWindow, RunRecord};

const QUERY_PATH: &str = "/api/v1/runs/query";

/// Fields requested for every run.
const SELECT_FIELDS: &[&str] = &[
    "id",
    "trace_id",
    "thread_id",
    "session_id",
    "name",
    "outputs",
    "start_time",
];

/// Pages needed before a percentage estimate is attempted.
const ESTIMATION_MIN_PAGES: usize = 2;
const RECENT_PAGES_SAMPLE: usize = 3;

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed, last error: {last}")]
    RetryExhausted { attempts: usize, last: String },
}

impl QueryError {
    /// Transport failures, rate limiting and server errors are worth retrying.
    fn is_transient(&self) -> bool {
        match self {
            QueryError::Http(_) => true,
            QueryError::Api { code, .. } => {
                *code == StatusCode::TOO_MANY_REQUESTS.as_u16() || *code >= 500
            }
            _ => false,
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct RunsQuery<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    limit: u32,
    session: &'a [String],
    is_root: bool,
    start_time: String,
    end_time: String,
    order_by: &'static str,
    select: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunsPage {
    runs: Option<Vec<RunRecord>>,
    #[serde(default)]
    cursors: Option<PageCursors>,
}

#[derive(Debug, Deserialize)]
struct PageCursors {
    next: Option<String>,
}

// ============================================================================
// Progress estimation
// ============================================================================

/// Rough completion estimate from the sizes of the pages seen so far.
#[derive(Debug, Default)]
pub struct PageProgress {
    history: Vec<usize>,
}

impl PageProgress {
    pub fn record(&mut self, page_len: usize) {
        self.history.push(page_len);
    }

    pub fn describe(&self, total_so_far: usize, has_next: bool) -> String {
        if !has_next {
            return "100% completed".to_string();
        }
        if self.history.len() < ESTIMATION_MIN_PAGES {
            return "estimating...".to_string();
        }

        let estimated_total = total_so_far + self.remaining_estimate();
        let percent = if estimated_total > 0 {
            total_so_far * 100 / estimated_total
        } else {
            0
        };

        // Never claim more than 95% while another page is pending.
        format!("{}% complete", percent.min(95))
    }

    fn remaining_estimate(&self) -> usize {
        let overall_avg = mean(&self.history);
        let recent = &self.history[self.history.len().saturating_sub(RECENT_PAGES_SAMPLE)..];
        let recent_avg = mean(recent);

        if recent_avg < overall_avg * 0.5 && self.history.len() > 3 {
            let pages_left = 1 + recent.iter().filter(|&&n| n > 0).count();
            (recent_avg * pages_left as f64) as usize
        } else {
            (overall_avg * 2.0) as usize
        }
    }
}

fn mean(values: &[usize]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<usize>() as f64 / values.len() as f64
}

// ============================================================================
// LangSmithClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct LangSmithClient {
    client: Client,
    config: LangSmithConfig,
    query_url: String,
}

impl LangSmithClient {
    pub fn new(config: LangSmithConfig) -> Result<Self, QueryError> {
        if config.api_key.trim().is_empty() {
            return Err(QueryError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let query_url = format!("{}{}", config.endpoint.trim_end_matches('/'), QUERY_PATH);

        Ok(Self {
            client,
            config,
            query_url,
        })
    }

    /// Fetch every root run in `window`, stopping once `debug_limit` runs are held.
    pub async fn fetch_all_runs(
        &self,
        window: &ExportWindow,
        debug_limit: Option<usize>,
    ) -> Result<Vec<RunRecord>, QueryError> {
        let mut all_runs: Vec<RunRecord> = Vec::new();
        let mut progress = PageProgress::default();
        let mut cursor: Option<String> = None;
        let mut page_index = 0usize;

        if debug_limit == Some(0) {
            tracing::info!("Debug limit is 0, skipping LangSmith query");
            return Ok(all_runs);
        }

        loop {
            page_index += 1;

            let page = self.query_page(window, cursor.as_deref()).await?;
            let runs = page
                .runs
                .ok_or_else(|| QueryError::InvalidResponse("missing 'runs' array".to_string()))?;
            let next = page
                .cursors
                .and_then(|c| c.next)
                .filter(|c| !c.is_empty());

            let fetched = runs.len();
            all_runs.extend(runs);
            progress.record(fetched);

            tracing::info!(
                page = page_index,
                fetched,
                total = all_runs.len(),
                progress = %progress.describe(all_runs.len(), next.is_some()),
                "Fetched runs page"
            );

            if let Some(limit) = debug_limit {
                if all_runs.len() >= limit {
                    tracing::info!(limit, "Debug limit reached, stopping pagination");
                    all_runs.truncate(limit);
                    break;
                }
            }

            match next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all_runs)
    }

    async fn query_page(
        &self,
        window: &ExportWindow,
        cursor: Option<&str>,
    ) -> Result<RunsPage, QueryError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.query_once(window, cursor),
            |e: &QueryError| {
                let transient = e.is_transient();
                if transient {
                    tracing::warn!(error = %e, "LangSmith query failed, retrying");
                }
                transient
            },
        )
        .await;

        match result {
            Ok(page) => Ok(page),
            Err(e) if e.is_transient() => {
                tracing::error!(
                    attempts = self.config.max_retries + 1,
                    error = %e,
                    "All LangSmith query attempts failed"
                );
                Err(QueryError::RetryExhausted {
                    attempts: self.config.max_retries + 1,
                    last: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn query_once(
        &self,
        window: &ExportWindow,
        cursor: Option<&str>,
    ) -> Result<RunsPage, QueryError> {
        let request = RunsQuery {
            cursor,
            limit: self.config.page_size,
            session: &self.config.session_ids,
            is_root: true,
            start_time: window.start_iso(),
            end_time: window.end_iso(),
            order_by: "start_time",
            select: SELECT_FIELDS,
            filter: self
                .config
                .filter_name
                .as_deref()
                .map(|name| format!("eq(name, \"{}\")", name)),
        };

        let response = self
            .client
            .post(&self.query_url)
            .header("x-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message: String = body.chars().take(400).collect();
            tracing::warn!(code = status.as_u16(), message = %message, "LangSmith API error");
            return Err(QueryError::Api {
                code: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| QueryError::InvalidResponse(e.to_string()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(endpoint: &str) -> LangSmithConfig {
        LangSmithConfig {
            api_key: "test-api-key".to_string(),
            session_ids: vec!["session-a".to_string()],
            endpoint: endpoint.to_string(),
            filter_name: None,
            page_size: 2,
            max_retries: 2,
            retry_delay_ms: 10,
            timeout_seconds: 5,
        }
    }

    fn window() -> ExportWindow {
        ExportWindow::ending_at(Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 0).unwrap(), 24.0).unwrap()
    }

    fn runs_json(ids: &[&str]) -> Vec<serde_json::Value> {
        ids.iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "thread_id": format!("user-{}", id),
                    "start_time": "2025-03-01T12:00:00.000000",
                    "outputs": { "messages": [{ "role": "user", "content": "hi" }] }
                })
            })
            .collect()
    }

    fn page(ids: &[&str], next: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "runs": runs_json(ids),
            "cursors": { "next": next }
        })
    }

    #[tokio::test]
    async fn test_first_page_request_shape() {
        let mock_server = MockServer::start().await;
        let mut config = test_config(&mock_server.uri());
        config.filter_name = Some("tutor".to_string());
        let client = LangSmithClient::new(config).unwrap();

        Mock::given(method("POST"))
            .and(path("/api/v1/runs/query"))
            .and(header("x-api-key", "test-api-key"))
            .and(body_partial_json(serde_json::json!({
                "limit": 2,
                "session": ["session-a"],
                "is_root": true,
                "start_time": "2025-03-01T00:00:00Z",
                "end_time": "2025-03-02T00:00:00Z",
                "order_by": "start_time",
                "filter": "eq(name, \"tutor\")"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1"], None)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let runs = client.fetch_all_runs(&window(), None).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "r1");
    }

    #[tokio::test]
    async fn test_follows_cursors_until_exhausted() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({ "cursor": "c2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r3"], None)))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1", "r2"], Some("c2"))))
            .expect(1)
            .mount(&mock_server)
            .await;

        let runs = client.fetch_all_runs(&window(), None).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn test_debug_limit_stops_pagination_and_truncates() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1", "r2"], Some("more"))))
            .expect(2)
            .mount(&mock_server)
            .await;

        let runs = client.fetch_all_runs(&window(), Some(3)).await.unwrap();
        assert_eq!(runs.len(), 3);
    }

    #[tokio::test]
    async fn test_zero_debug_limit_skips_query() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1"], None)))
            .expect(0)
            .mount(&mock_server)
            .await;

        let runs = client.fetch_all_runs(&window(), Some(0)).await.unwrap();
        assert!(runs.is_empty());
    }

    #[tokio::test]
    async fn test_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1"], None)))
            .mount(&mock_server)
            .await;

        let runs = client.fetch_all_runs(&window(), None).await;
        assert!(runs.is_ok(), "Expected success after retry: {:?}", runs.err());
        assert_eq!(runs.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_exhaust_retries() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&mock_server)
            .await;

        match client.fetch_all_runs(&window(), None).await {
            Err(QueryError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.contains("500"), "unexpected last error: {}", last);
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.fetch_all_runs(&window(), None).await {
            Err(QueryError::Api { code, message }) => {
                assert_eq!(code, 401);
                assert_eq!(message, "bad key");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_runs_array_is_invalid() {
        let mock_server = MockServer::start().await;
        let client = LangSmithClient::new(test_config(&mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "cursors": {} })))
            .mount(&mock_server)
            .await;

        assert!(matches!(
            client.fetch_all_runs(&window(), None).await,
            Err(QueryError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_api_key() {
        let mut config = test_config("http://localhost");
        config.api_key = String::new();
        assert!(matches!(
            LangSmithClient::new(config),
            Err(QueryError::MissingApiKey)
        ));
    }

    #[test]
    fn test_progress_estimates() {
        let mut progress = PageProgress::default();
        progress.record(100);
        assert_eq!(progress.describe(100, true), "estimating...");
        assert_eq!(progress.describe(100, false), "100% completed");

        // Steady pages: remaining ~ 2 pages of 100.
        progress.record(100);
        assert_eq!(progress.describe(200, true), "50% complete");

        // Tapering pages: recent average drops below half the overall average.
        let mut tapering = PageProgress::default();
        for n in [100, 100, 100, 100, 100, 100, 10, 10, 10] {
            tapering.record(n);
        }
        // recent_avg 10, 3 non-empty recent pages -> 40 remaining of 670.
        assert_eq!(tapering.describe(630, true), "94% complete");
    }

    #[test]
    fn test_progress_caps_at_95() {
        let mut progress = PageProgress::default();
        for n in [100, 100, 100, 100, 100, 100, 100, 100, 0, 0, 1] {
            progress.record(n);
        }
        assert_eq!(progress.describe(801, true), "95% complete");
    }
}
