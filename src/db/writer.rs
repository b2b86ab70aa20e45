use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::db::services::website_result_service;
use crate::monitor::checker::CheckResult;
use crate::monitor::sink::{ResultSink, StorageError};

#[derive(Debug, Clone, Copy)]
pub struct ResultWriterConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub queue_capacity: usize,
}

/// [`ResultSink`] that hands results to a background writer task.
///
/// `store` never waits on the database: it only enqueues. The writer task
/// batches what it receives and inserts it with one statement per batch.
#[derive(Clone, Debug)]
pub struct ResultWriter {
    sender: mpsc::Sender<CheckResult>,
}

impl ResultWriter {
    /// Starts the writer task. It flushes what is left and exits once every
    /// clone of the returned `ResultWriter` has been dropped.
    pub fn spawn(db: Arc<DatabaseConnection>, config: ResultWriterConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(results_writer_task(
            db,
            receiver,
            config.batch_size.max(1),
            config.flush_interval,
        ));
        (Self { sender }, handle)
    }
}

#[async_trait]
impl ResultSink for ResultWriter {
    async fn store(&self, result: CheckResult) -> Result<(), StorageError> {
        let website_id = result.website_id;
        self.sender.try_send(result).map_err(|e| match e {
            TrySendError::Full(_) => StorageError::QueueFull(website_id),
            TrySendError::Closed(_) => StorageError::Closed,
        })
    }
}

async fn results_writer_task(
    db: Arc<DatabaseConnection>,
    mut receiver: mpsc::Receiver<CheckResult>,
    batch_size: usize,
    flush_interval: Duration,
) {
    info!(batch_size, flush_interval_seconds = flush_interval.as_secs(), "Result writer task started.");

    let mut buffer = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(result) => {
                    buffer.push(result);
                    if buffer.len() >= batch_size {
                        flush_results_to_db(&db, &mut buffer).await;
                    }
                }
                None => {
                    info!("Result channel closed. Flushing remaining results and shutting down writer.");
                    flush_results_to_db(&db, &mut buffer).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush_results_to_db(&db, &mut buffer).await;
            }
        }
    }
    info!("Result writer task finished.");
}

/// Writes and clears the buffer. A failed batch is retried row by row so a
/// single bad row (for instance one whose website was just deleted) does not
/// take the rest of the batch with it.
async fn flush_results_to_db(db: &DatabaseConnection, buffer: &mut Vec<CheckResult>) {
    if buffer.is_empty() {
        return;
    }
    let batch: Vec<CheckResult> = buffer.drain(..).collect();
    let breakdown = status_code_breakdown(&batch);

    match website_result_service::insert_results(db, &batch).await {
        Ok(_) => {
            info!(count = batch.len(), status_codes = %breakdown, "Saved check results.");
        }
        Err(e) => {
            warn!(count = batch.len(), error = %e, "Batch insert failed, retrying results one by one.");
            let mut saved = 0;
            for result in &batch {
                match website_result_service::insert_results(db, std::slice::from_ref(result)).await {
                    Ok(_) => saved += 1,
                    Err(e) => {
                        error!(website_id = result.website_id, error = %e, "Dropping check result that could not be saved.")
                    }
                }
            }
            info!(saved, dropped = batch.len() - saved, status_codes = %breakdown, "Saved check results.");
        }
    }
}

/// Renders e.g. `200: 5, 503: 1, none: 2`, most frequent first.
fn status_code_breakdown(batch: &[CheckResult]) -> String {
    let mut counts: HashMap<Option<u16>, usize> = HashMap::new();
    for result in batch {
        *counts.entry(result.http_status_code).or_default() += 1;
    }
    let mut counts: Vec<(Option<u16>, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    counts
        .into_iter()
        .map(|(status, count)| match status {
            Some(code) => format!("{code}: {count}"),
            None => format!("none: {count}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
