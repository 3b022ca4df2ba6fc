//! Queue-level error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to encode dispatch payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to enqueue job: {0}")]
    Enqueue(#[from] db::DbError),
}
