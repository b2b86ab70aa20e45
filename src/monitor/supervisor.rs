//! Keeps the set of running monitor tasks in line with the registry.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::checker::Checker;
use super::registry::TargetRegistry;
use super::sink::ResultSink;
use super::target::Target;
use super::task::MonitorTaskHandle;

/// What a single reconciliation pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub started: usize,
    pub stopped: usize,
    pub restarted: usize,
}

impl ReconcileSummary {
    pub fn is_noop(&self) -> bool {
        self.started == 0 && self.stopped == 0 && self.restarted == 0
    }
}

/// Owns every running monitor task, keyed by website id.
///
/// All task starts and stops go through `&mut self`, so there is never more
/// than one task per id.
pub struct MonitorSupervisor {
    registry: Arc<TargetRegistry>,
    checker: Arc<dyn Checker>,
    sink: Arc<dyn ResultSink>,
    running_tasks: HashMap<i32, MonitorTaskHandle>,
}

impl MonitorSupervisor {
    pub fn new(
        registry: Arc<TargetRegistry>,
        checker: Arc<dyn Checker>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            registry,
            checker,
            sink,
            running_tasks: HashMap::new(),
        }
    }

    /// Ids with a running task, sorted.
    pub fn running_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.running_tasks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Makes the running task set match the registry: starts tasks for new
    /// targets, stops tasks for removed ones and restarts tasks whose
    /// schedule changed. Safe to call any number of times.
    pub async fn reconcile(&mut self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let desired: HashMap<i32, Target> = self
            .registry
            .list()
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        // 1. Stop tasks whose target is gone.
        let removed_ids: Vec<i32> = self
            .running_tasks
            .keys()
            .filter(|id| !desired.contains_key(id))
            .copied()
            .collect();
        for website_id in removed_ids {
            if let Some(handle) = self.running_tasks.remove(&website_id) {
                info!(website_id, "Stopping monitor task for removed website.");
                handle.stop().await;
                summary.stopped += 1;
            }
        }

        // 2. Start new tasks and restart drifted or dead ones.
        for (website_id, target) in desired {
            let restart = match self.running_tasks.get(&website_id) {
                None => false,
                Some(handle) if handle.is_finished() => {
                    warn!(website_id, "Monitor task exited unexpectedly, restarting it.");
                    true
                }
                Some(handle) if handle.target.same_schedule(&target) => continue,
                Some(_) => {
                    info!(website_id, "Website configuration changed, restarting monitor task.");
                    true
                }
            };
            if restart {
                if let Some(handle) = self.running_tasks.remove(&website_id) {
                    handle.stop().await;
                }
                summary.restarted += 1;
            } else {
                summary.started += 1;
            }
            self.start(target);
        }

        summary
    }

    fn start(&mut self, target: Target) {
        let website_id = target.id;
        let handle = MonitorTaskHandle::spawn(target, self.checker.clone(), self.sink.clone());
        self.running_tasks.insert(website_id, handle);
    }

    /// Reconciles on every registry change and at least every `poll_interval`
    /// until `shutdown_rx` fires, then stops every task.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>, poll_interval: Duration) {
        let mut registry_changes = self.registry.subscribe();
        info!(
            poll_interval_seconds = poll_interval.as_secs(),
            "Monitor supervisor started."
        );

        loop {
            let summary = self.reconcile().await;
            if summary.is_noop() {
                debug!("Reconciliation found nothing to change.");
            } else {
                info!(
                    started = summary.started,
                    stopped = summary.stopped,
                    restarted = summary.restarted,
                    running = self.running_tasks.len(),
                    "Reconciled monitor tasks."
                );
            }

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = registry_changes.changed() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.shutdown().await;
        info!("Monitor supervisor gracefully shut down.");
    }

    /// Stops every running task and waits until all of them have exited.
    /// No probe is in flight and no result is stored once this returns.
    pub async fn shutdown(&mut self) {
        let count = self.running_tasks.len();
        info!(count, "Stopping all monitor tasks.");
        join_all(self.running_tasks.drain().map(|(_, handle)| handle.stop())).await;
    }
}
