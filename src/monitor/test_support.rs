//! Fakes shared by the scheduler tests.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use super::checker::{CheckResult, Checker, Compliance, ProbeFailure};
use super::sink::{ResultSink, StorageError};
use super::target::Target;

#[derive(Default)]
pub(crate) struct CountingChecker {
    probes: Mutex<Vec<(i32, Instant)>>,
    fail: bool,
    panic_next: AtomicBool,
    delay: Option<Duration>,
}

impl CountingChecker {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn panicking_once() -> Self {
        Self {
            panic_next: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub(crate) fn probes_for(&self, website_id: i32) -> usize {
        self.probe_times(website_id).len()
    }

    pub(crate) fn probe_times(&self, website_id: i32) -> Vec<Instant> {
        self.probes
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == website_id)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Checker for CountingChecker {
    async fn probe(&self, target: &Target) -> CheckResult {
        self.probes.lock().unwrap().push((target.id, Instant::now()));
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("probe exploded");
        }
        let request_timestamp = Utc::now();
        let started = Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return CheckResult::failed(
                target.id,
                request_timestamp,
                ProbeFailure::Timeout(Duration::from_secs(1)),
            );
        }
        CheckResult {
            website_id: target.id,
            request_timestamp,
            response_timestamp: Some(Utc::now()),
            response_time: Some(started.elapsed()),
            http_status_code: Some(200),
            compliance: Compliance::Unknown,
            failure: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    results: Mutex<Vec<CheckResult>>,
    failures_left: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn failing_first(count: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(count),
            ..Default::default()
        }
    }

    pub(crate) fn results_for(&self, website_id: i32) -> Vec<CheckResult> {
        self.results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.website_id == website_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn store(&self, result: CheckResult) -> Result<(), StorageError> {
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::QueueFull(result.website_id));
        }
        self.results.lock().unwrap().push(result);
        Ok(())
    }
}
