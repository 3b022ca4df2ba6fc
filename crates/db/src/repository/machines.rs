//! Machine, environment and permission queries.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Environment ids that belong to an app.
pub async fn list_app_environments(pool: &PgPool, app_id: Uuid) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM environments WHERE app_id = $1")
        .bind(app_id)
        .fetch_all(pool)
        .await?;

    Ok(ids)
}

/// Environment of each machine in `machine_ids` that still exists.
pub async fn machine_environments(
    pool: &PgPool,
    machine_ids: &[Uuid],
) -> Result<HashMap<Uuid, Option<Uuid>>, DbError> {
    let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
        "SELECT id, env_id FROM machines WHERE id = ANY($1)",
    )
    .bind(machine_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

/// Machines of `app_id` the user holds a grant on, either for this template
/// or for every template (`operation_template_id IS NULL`).
pub async fn available_machines(
    pool: &PgPool,
    user_id: Uuid,
    app_id: Uuid,
    template_id: Uuid,
) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT m.id
        FROM machines m
        WHERE m.app_id = $2
          AND EXISTS (
              SELECT 1 FROM machine_permissions p
              WHERE p.machine_id = m.id
                AND p.user_id = $1
                AND (p.operation_template_id IS NULL OR p.operation_template_id = $3)
          )
        ORDER BY m.created_at ASC, m.id ASC
        "#,
    )
    .bind(user_id)
    .bind(app_id)
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
