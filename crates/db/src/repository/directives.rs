//! Directive and directive-template queries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{DirectiveRow, DirectiveState, DirectiveTemplateRow},
};

// ---------------------------------------------------------------------------
// directives
// ---------------------------------------------------------------------------

/// Insert a batch of directives inside one transaction.
pub async fn insert_directives(pool: &PgPool, rows: &[DirectiveRow]) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO directives
                (id, operation_id, machine_id, directive_template_id, step_index, pluggable,
                 ignorable_on_failure, state, pre_id, next_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(row.id)
        .bind(row.operation_id)
        .bind(row.machine_id)
        .bind(row.directive_template_id)
        .bind(row.step_index)
        .bind(row.pluggable)
        .bind(row.ignorable_on_failure)
        .bind(row.state)
        .bind(row.pre_id)
        .bind(row.next_id)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn set_pre_id(pool: &PgPool, id: Uuid, pre_id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE directives SET pre_id = $1 WHERE id = $2")
        .bind(pre_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_next_id(pool: &PgPool, id: Uuid, next_id: Uuid) -> Result<(), DbError> {
    sqlx::query("UPDATE directives SET next_id = $1 WHERE id = $2")
        .bind(next_id)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_states(
    pool: &PgPool,
    ids: &[Uuid],
    state: DirectiveState,
) -> Result<(), DbError> {
    sqlx::query("UPDATE directives SET state = $1 WHERE id = ANY($2)")
        .bind(state)
        .bind(ids)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_for_operation(pool: &PgPool, operation_id: Uuid) -> Result<Vec<DirectiveRow>, DbError> {
    let rows = sqlx::query_as::<_, DirectiveRow>(
        r#"
        SELECT id, operation_id, machine_id, directive_template_id, step_index, pluggable,
               ignorable_on_failure, state, pre_id, next_id, created_at
        FROM directives
        WHERE operation_id = $1
        ORDER BY step_index ASC, created_at ASC
        "#,
    )
    .bind(operation_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// directive_templates
// ---------------------------------------------------------------------------

pub async fn get_directive_template(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<DirectiveTemplateRow>, DbError> {
    let row = sqlx::query_as::<_, DirectiveTemplateRow>(
        "SELECT id, app_id, name, pluggable FROM directive_templates WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
