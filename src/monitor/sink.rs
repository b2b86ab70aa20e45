use async_trait::async_trait;
use thiserror::Error;

use super::checker::CheckResult;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Result queue is full, dropping result for website {0}")]
    QueueFull(i32),
    #[error("Result writer has shut down")]
    Closed,
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Durable destination for check results. Each call stores one complete
/// result; implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn store(&self, result: CheckResult) -> Result<(), StorageError>;
}
