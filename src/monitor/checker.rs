//! Single HTTP probes against a target.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

use super::target::Target;

/// Tri-state outcome of matching a response body against the target's pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compliance {
    Compliant,
    NonCompliant,
    /// No pattern configured, or the body could not be read.
    Unknown,
}

impl Compliance {
    pub fn as_option(self) -> Option<bool> {
        match self {
            Compliance::Compliant => Some(true),
            Compliance::NonCompliant => Some(false),
            Compliance::Unknown => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Failed to read response body: {0}")]
    Body(String),
}

/// Outcome of one probe. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct CheckResult {
    pub website_id: i32,
    pub request_timestamp: DateTime<Utc>,
    pub response_timestamp: Option<DateTime<Utc>>,
    /// Measured on the monotonic clock, so wall-clock adjustments between
    /// the two timestamps cannot distort it. Only set when a response arrived.
    pub response_time: Option<Duration>,
    pub http_status_code: Option<u16>,
    pub compliance: Compliance,
    /// Why the probe did not complete normally. Only logged, never persisted.
    pub failure: Option<ProbeFailure>,
}

impl CheckResult {
    /// A probe that never got a response.
    pub fn failed(website_id: i32, request_timestamp: DateTime<Utc>, failure: ProbeFailure) -> Self {
        Self {
            website_id,
            request_timestamp,
            response_timestamp: None,
            response_time: None,
            http_status_code: None,
            compliance: Compliance::Unknown,
            failure: Some(failure),
        }
    }

    pub fn is_up(&self) -> bool {
        self.http_status_code
            .is_some_and(|status| (200..400).contains(&status))
    }
}

/// Performs one check against a target. Network-level problems are reported
/// inside the returned [`CheckResult`], never as an error.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn probe(&self, target: &Target) -> CheckResult;
}

/// [`Checker`] backed by a shared `reqwest` client.
#[derive(Clone, Debug)]
pub struct HttpChecker {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl HttpChecker {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitewatch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, request_timeout))
    }

    pub fn with_client(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    /// The timeout applied to a probe of `target`; always strictly shorter than
    /// its interval so probes of one target never overlap.
    pub fn effective_timeout(&self, target: &Target) -> Duration {
        self.request_timeout.min(target.interval * 9 / 10)
    }
}

fn classify_error(e: &reqwest::Error, timeout: Duration) -> ProbeFailure {
    if e.is_timeout() {
        ProbeFailure::Timeout(timeout)
    } else if e.is_connect() {
        ProbeFailure::Connect(e.to_string())
    } else {
        ProbeFailure::Request(e.to_string())
    }
}

#[async_trait]
impl Checker for HttpChecker {
    async fn probe(&self, target: &Target) -> CheckResult {
        let timeout = self.effective_timeout(target);
        let request_timestamp = Utc::now();
        let started = Instant::now();
        let response = match self.client.get(&target.url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                let failure = classify_error(&e, timeout);
                debug!(website_id = target.id, error = %failure, "Probe failed before a response arrived.");
                return CheckResult::failed(target.id, request_timestamp, failure);
            }
        };
        let status = response.status().as_u16();

        let (compliance, failure) = match &target.pattern {
            None => (Compliance::Unknown, None),
            Some(pattern) => match response.text().await {
                Ok(body) if pattern.is_match(&body) => (Compliance::Compliant, None),
                Ok(_) => (Compliance::NonCompliant, None),
                Err(e) if e.is_timeout() => {
                    // The response never completed; treat it like any other timeout.
                    let failure = ProbeFailure::Timeout(timeout);
                    return CheckResult::failed(target.id, request_timestamp, failure);
                }
                Err(e) => (Compliance::Unknown, Some(ProbeFailure::Body(e.to_string()))),
            },
        };

        CheckResult {
            website_id: target.id,
            request_timestamp,
            response_timestamp: Some(Utc::now()),
            response_time: Some(started.elapsed()),
            http_status_code: Some(status),
            compliance,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::target::NewTarget;
    use axum::{Router, routing::get};
    use tokio::net::TcpListener;

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/ok", get(|| async { "system OK" }))
            .route("/down", get(|| async { "down" }))
            .route(
                "/error",
                get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "OK but failing") }),
            )
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "too late"
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn target(url: &str, pattern: Option<&str>) -> Target {
        NewTarget::parse(url, 10, pattern).unwrap().into_target(7)
    }

    #[tokio::test]
    async fn test_pattern_found_in_body_is_compliant() {
        let base = spawn_server().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let result = checker.probe(&target(&format!("{base}/ok"), Some("OK"))).await;

        assert_eq!(result.website_id, 7);
        assert_eq!(result.http_status_code, Some(200));
        assert_eq!(result.compliance, Compliance::Compliant);
        assert!(result.failure.is_none());
        assert!(result.response_time.is_some());
        assert!(result.is_up());
    }

    #[tokio::test]
    async fn test_pattern_missing_from_body_is_non_compliant() {
        let base = spawn_server().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let result = checker.probe(&target(&format!("{base}/down"), Some("OK"))).await;

        assert_eq!(result.http_status_code, Some(200));
        assert_eq!(result.compliance, Compliance::NonCompliant);
    }

    #[tokio::test]
    async fn test_no_pattern_means_unknown_compliance() {
        let base = spawn_server().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        for path in ["/ok", "/down"] {
            let result = checker.probe(&target(&format!("{base}{path}"), None)).await;
            assert_eq!(result.http_status_code, Some(200));
            assert_eq!(result.compliance, Compliance::Unknown);
        }
    }

    #[tokio::test]
    async fn test_error_status_is_recorded_not_failed() {
        let base = spawn_server().await;
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let result = checker.probe(&target(&format!("{base}/error"), Some("OK"))).await;

        assert_eq!(result.http_status_code, Some(503));
        assert_eq!(result.compliance, Compliance::Compliant);
        assert!(!result.is_up());
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn test_timeout_yields_absent_fields() {
        let base = spawn_server().await;
        let checker = HttpChecker::new(Duration::from_millis(200)).unwrap();

        let result = checker.probe(&target(&format!("{base}/slow"), Some("OK"))).await;

        assert_eq!(result.http_status_code, None);
        assert_eq!(result.response_timestamp, None);
        assert_eq!(result.response_time, None);
        assert_eq!(result.compliance, Compliance::Unknown);
        assert!(matches!(result.failure, Some(ProbeFailure::Timeout(_))));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_failed_result() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();

        let result = checker.probe(&target(&format!("http://{addr}/"), None)).await;

        assert_eq!(result.http_status_code, None);
        assert_eq!(result.response_time, None);
        assert!(result.failure.is_some());
    }

    #[test]
    fn test_effective_timeout_stays_below_interval() {
        let checker = HttpChecker::new(Duration::from_secs(30)).unwrap();
        let t = target("https://example.com", None);
        assert_eq!(checker.effective_timeout(&t), Duration::from_secs(9));

        let checker = HttpChecker::new(Duration::from_secs(2)).unwrap();
        assert_eq!(checker.effective_timeout(&t), Duration::from_secs(2));
    }
}
