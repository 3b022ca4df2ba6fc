//! Job queue repository functions.
//!
//! The dispatch hand-off is backed by the `job_queue` Postgres table.
//! The out-of-process executor polls it; this crate only ever inserts.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{JobRow, JobStatus},
};

/// Enqueue a new job for the given operation.
///
/// `payload` is arbitrary JSON that the executor will read back.
pub async fn enqueue_job(
    pool: &PgPool,
    operation_id: Uuid,
    payload: serde_json::Value,
) -> Result<JobRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO job_queue
            (id, operation_id, status, attempts, max_attempts, payload, created_at, updated_at)
        VALUES ($1, $2, $3, 0, 3, $4, $5, $5)
        RETURNING id, operation_id, status, attempts, max_attempts, payload, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(operation_id)
    .bind(JobStatus::Pending.to_string())
    .bind(payload)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
