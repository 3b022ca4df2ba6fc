//! `PgJobDispatcher`: writes dispatch requests into the `job_queue` table.

use async_trait::async_trait;
use db::{DbPool, repository::jobs};
use tracing::info;

use crate::{DispatchRequest, Dispatcher, QueueError};

#[derive(Clone)]
pub struct PgJobDispatcher {
    pool: DbPool,
}

impl PgJobDispatcher {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Dispatcher for PgJobDispatcher {
    async fn dispatch(&self, request: DispatchRequest) -> Result<(), QueueError> {
        let payload = serde_json::to_value(&request)?;
        let job = jobs::enqueue_job(&self.pool, request.operation_id, payload).await?;
        info!(
            "queued job {} for operation {} ({} machines, run_now={})",
            job.id,
            request.operation_id,
            request.machine_ids.len(),
            request.should_run_now
        );
        Ok(())
    }
}
