use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// Why a signal query did not produce a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReason {
    None,
    Timeout,
    Unreachable,
    MalformedResponse,
}

impl std::fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorReason::None => "none",
            ErrorReason::Timeout => "timeout",
            ErrorReason::Unreachable => "unreachable",
            ErrorReason::MalformedResponse => "malformed_response",
        })
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query timed out")]
    Timeout,
    #[error("backend unreachable: {0}")]
    Unreachable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl QueryError {
    fn reason(&self) -> ErrorReason {
        match self {
            QueryError::Timeout => ErrorReason::Timeout,
            QueryError::Unreachable(_) => ErrorReason::Unreachable,
            QueryError::Malformed(_) => ErrorReason::MalformedResponse,
        }
    }

    /// A parseable-but-wrong payload will not improve on retry; network
    /// failures and timeouts might.
    fn is_retryable(&self) -> bool {
        !matches!(self, QueryError::Malformed(_))
    }
}

/// Outcome of one signal query, including retries. All failure modes are
/// encoded here; nothing escapes the client boundary.
#[derive(Debug, Clone, Serialize)]
pub struct SignalResult {
    pub value: Option<f64>,
    pub ok: bool,
    pub error: ErrorReason,
    pub attempts: u32,
}

impl SignalResult {
    pub fn good(value: f64, attempts: u32) -> Self {
        Self {
            value: Some(value),
            ok: true,
            error: ErrorReason::None,
            attempts,
        }
    }

    pub fn failed(error: ErrorReason, attempts: u32) -> Self {
        Self {
            value: None,
            ok: false,
            error,
            attempts,
        }
    }
}

/// Seam between the evaluator and the metrics backend, so the decision
/// logic can be exercised against stubbed signals.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn query(&self, expr: &str) -> SignalResult;
}

#[derive(Deserialize)]
struct QueryResponse {
    status: String,
    data: Option<QueryData>,
}

#[derive(Deserialize)]
struct QueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<Series>,
}

#[derive(Deserialize)]
struct Series {
    // Instant vectors carry [unix_seconds, "<float literal>"]
    value: (f64, String),
}

/// Extracts exactly one finite scalar from a Prometheus instant-query
/// envelope. Zero series, multiple series, or a non-finite value are all
/// malformed for our purposes: the probe queries are scoped to a single
/// consumer group and must resolve to a single number.
fn parse_scalar(body: &str) -> Result<f64, QueryError> {
    let response: QueryResponse =
        serde_json::from_str(body).map_err(|e| QueryError::Malformed(e.to_string()))?;

    if response.status != "success" {
        return Err(QueryError::Malformed(format!(
            "query status {}",
            response.status
        )));
    }

    let data = response
        .data
        .ok_or_else(|| QueryError::Malformed("missing data field".to_string()))?;

    if data.result_type != "vector" {
        return Err(QueryError::Malformed(format!(
            "unexpected result type {}",
            data.result_type
        )));
    }

    match data.result.as_slice() {
        [series] => {
            let value: f64 = series
                .value
                .1
                .parse()
                .map_err(|_| QueryError::Malformed(format!("bad sample {}", series.value.1)))?;
            if !value.is_finite() {
                return Err(QueryError::Malformed(format!("non-finite sample {value}")));
            }
            Ok(value)
        }
        other => Err(QueryError::Malformed(format!(
            "expected exactly one series, got {}",
            other.len()
        ))),
    }
}

/// Instant-query client with a per-attempt deadline and a bounded retry
/// budget. Failures come back as a `SignalResult`, never as an error.
pub struct PromClient {
    client: reqwest::Client,
    query_url: String,
    max_retries: u32,
}

impl PromClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.query_timeout())
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self {
            client,
            query_url: format!(
                "{}/api/v1/query",
                config.prometheus_url.trim_end_matches('/')
            ),
            max_retries: config.prom_retries,
        })
    }

    async fn query_once(&self, expr: &str) -> Result<f64, QueryError> {
        let response = self
            .client
            .get(&self.query_url)
            .query(&[("query", expr)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueryError::Timeout
                } else {
                    QueryError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(QueryError::Unreachable(format!("backend returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| QueryError::Unreachable(e.to_string()))?;

        parse_scalar(&body)
    }
}

fn backoff() -> Duration {
    Duration::from_millis(rand::thread_rng().gen_range(20..60))
}

#[async_trait]
impl SignalSource for PromClient {
    async fn query(&self, expr: &str) -> SignalResult {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.query_once(expr).await {
                Ok(value) => {
                    debug!(expr, value, attempts, "query succeeded");
                    return SignalResult::good(value, attempts);
                }
                Err(err) if err.is_retryable() && attempts <= self.max_retries => {
                    warn!(expr, attempts, "query attempt failed, retrying: {err}");
                    tokio::time::sleep(backoff()).await;
                }
                Err(err) => {
                    warn!(expr, attempts, "query failed: {err}");
                    return SignalResult::failed(err.reason(), attempts);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_body(samples: &[&str]) -> String {
        let series: Vec<serde_json::Value> = samples
            .iter()
            .map(|sample| {
                serde_json::json!({
                    "metric": {"consumergroup": "clickhouse-ingestion"},
                    "value": [1_700_000_000.0, sample]
                })
            })
            .collect();
        serde_json::json!({
            "status": "success",
            "data": {"resultType": "vector", "result": series}
        })
        .to_string()
    }

    #[test]
    fn parses_a_single_finite_sample() {
        assert_eq!(parse_scalar(&vector_body(&["4.2"])).unwrap(), 4.2);
        assert_eq!(parse_scalar(&vector_body(&["0"])).unwrap(), 0.0);
    }

    #[test]
    fn rejects_empty_result() {
        let err = parse_scalar(&vector_body(&[])).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn rejects_multiple_series() {
        let err = parse_scalar(&vector_body(&["1.0", "2.0"])).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn rejects_non_numeric_sample() {
        let err = parse_scalar(&vector_body(&["not-a-number"])).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn rejects_non_finite_samples() {
        for sample in ["NaN", "+Inf", "-Inf"] {
            let err = parse_scalar(&vector_body(&[sample])).unwrap_err();
            assert!(matches!(err, QueryError::Malformed(_)), "sample {sample}");
        }
    }

    #[test]
    fn rejects_error_status() {
        let body = serde_json::json!({
            "status": "error",
            "errorType": "bad_data",
            "error": "parse error"
        })
        .to_string();
        let err = parse_scalar(&body).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn rejects_matrix_result_type() {
        let body = serde_json::json!({
            "status": "success",
            "data": {"resultType": "matrix", "result": []}
        })
        .to_string();
        let err = parse_scalar(&body).unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_scalar("{\"status\": \"succ").unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)));
    }

    #[test]
    fn malformed_is_not_retryable() {
        assert!(!QueryError::Malformed("x".to_string()).is_retryable());
        assert!(QueryError::Timeout.is_retryable());
        assert!(QueryError::Unreachable("x".to_string()).is_retryable());
    }
}
