//! The `Dispatcher` trait and the payload it carries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::QueueError;

/// The sole wire contract to the execution subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub operation_id: Uuid,
    pub machine_ids: Vec<Uuid>,
    /// `false` only for operations created in the `init` state.
    pub should_run_now: bool,
}

/// Receives admitted operations for asynchronous execution.
///
/// Implementations must return as soon as the request is durably queued.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError>;
}
