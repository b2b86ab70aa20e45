//! The long-lived loop that probes a single target.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::checker::Checker;
use super::sink::ResultSink;
use super::target::Target;

/// A running monitor task together with the target snapshot it was started from.
pub(crate) struct MonitorTaskHandle {
    pub(crate) target: Target,
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl MonitorTaskHandle {
    pub(crate) fn spawn(
        target: Target,
        checker: Arc<dyn Checker>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(run_monitor_loop(
            target.clone(),
            checker,
            sink,
            shutdown_rx,
        ));
        Self {
            target,
            shutdown_tx,
            join_handle,
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Kills the task without going through shutdown.
    #[cfg(test)]
    pub(crate) fn abort(&self) {
        self.join_handle.abort();
    }

    /// Signals the task to stop and waits until it has exited.
    pub(crate) async fn stop(self) {
        let website_id = self.target.id;
        if self.shutdown_tx.send(()).is_err() {
            warn!(website_id, "Monitor task had already finished before shutdown was signaled.");
        }
        if let Err(e) = self.join_handle.await {
            error!(website_id, error = %e, "Monitor task ended abnormally.");
        }
    }
}

fn is_cancelled(shutdown_rx: &mut oneshot::Receiver<()>) -> bool {
    !matches!(
        shutdown_rx.try_recv(),
        Err(oneshot::error::TryRecvError::Empty)
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Sleeps for the target's interval, probes, forwards the result, repeats.
///
/// Only the shutdown signal ends the loop. A signal that arrives while a probe
/// is in flight drops the probe and its result.
async fn run_monitor_loop(
    target: Target,
    checker: Arc<dyn Checker>,
    sink: Arc<dyn ResultSink>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let website_id = target.id;
    info!(
        website_id,
        url = %target.url,
        interval_seconds = target.interval.as_secs(),
        pattern = target.pattern_str().unwrap_or(""),
        "Monitor task started."
    );

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = tokio::time::sleep(target.interval) => {}
        }
        if is_cancelled(&mut shutdown_rx) {
            break;
        }

        let result = tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            outcome = AssertUnwindSafe(checker.probe(&target)).catch_unwind() => match outcome {
                Ok(result) => result,
                Err(panic) => {
                    error!(website_id, panic = panic_message(&*panic), "Probe panicked, monitoring continues.");
                    continue;
                }
            },
        };
        if is_cancelled(&mut shutdown_rx) {
            debug!(website_id, "Discarding result of a probe that finished after cancellation.");
            break;
        }

        match &result.failure {
            Some(failure) => warn!(website_id, url = %target.url, error = %failure, "Check failed."),
            None => debug!(
                website_id,
                status = result.http_status_code,
                response_time_ms = result.response_time.map(|d| d.as_millis() as u64),
                "Check completed."
            ),
        }

        match AssertUnwindSafe(sink.store(result)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(website_id, error = %e, "Failed to store check result."),
            Err(panic) => {
                error!(website_id, panic = panic_message(&*panic), "Result sink panicked, monitoring continues.")
            }
        }
    }

    info!(website_id, "Monitor task stopped.");
}
