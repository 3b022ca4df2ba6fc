//! Operation and machine-operation queries.

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{MachineOperationRow, OperationRow, OperationState},
};

// ---------------------------------------------------------------------------
// operations
// ---------------------------------------------------------------------------

pub async fn insert_operation(pool: &PgPool, operation: &OperationRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO operations
            (id, operation_template_id, operator_id, name, app_id, state, previous_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(operation.id)
    .bind(operation.operation_template_id)
    .bind(operation.operator_id)
    .bind(&operation.name)
    .bind(operation.app_id)
    .bind(operation.state)
    .bind(operation.previous_id)
    .bind(operation.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_operation(pool: &PgPool, id: Uuid) -> Result<Option<OperationRow>, DbError> {
    let row = sqlx::query_as::<_, OperationRow>(
        r#"
        SELECT id, operation_template_id, operator_id, name, app_id, state, previous_id, created_at
        FROM operations WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns [`DbError::NotFound`] if no row was updated.
pub async fn update_operation_state(
    pool: &PgPool,
    id: Uuid,
    state: OperationState,
) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE operations SET state = $1 WHERE id = $2")
        .bind(state)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound { table: "operations", id });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// machine_operations
// ---------------------------------------------------------------------------

/// Insert every row inside one transaction.
pub async fn insert_machine_operations(
    pool: &PgPool,
    rows: &[MachineOperationRow],
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO machine_operations
                (id, machine_id, operation_id, operation_template_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(row.id)
        .bind(row.machine_id)
        .bind(row.operation_id)
        .bind(row.operation_template_id)
        .bind(row.created_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Count machine-operation rows per machine for one template.
pub async fn machine_operation_counts(
    pool: &PgPool,
    template_id: Uuid,
) -> Result<HashMap<Uuid, i64>, DbError> {
    let rows = sqlx::query_as::<_, (Uuid, i64)>(
        r#"
        SELECT machine_id, COUNT(*)
        FROM machine_operations
        WHERE operation_template_id = $1
        GROUP BY machine_id
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}
