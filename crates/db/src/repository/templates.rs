//! Operation template and restriction queries.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{OperationTemplateRow, RestrictionRow},
};

// ---------------------------------------------------------------------------
// operation_templates
// ---------------------------------------------------------------------------

/// Fetch a single template by its primary key.
pub async fn get_template(pool: &PgPool, id: Uuid) -> Result<Option<OperationTemplateRow>, DbError> {
    let row = sqlx::query_as::<_, OperationTemplateRow>(
        r#"
        SELECT id, app_id, name, expression, pre_hook, created_at, updated_at
        FROM operation_templates WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Fetch a template by its per-app unique name.
pub async fn get_template_by_name(
    pool: &PgPool,
    app_id: Uuid,
    name: &str,
) -> Result<Option<OperationTemplateRow>, DbError> {
    let row = sqlx::query_as::<_, OperationTemplateRow>(
        r#"
        SELECT id, app_id, name, expression, pre_hook, created_at, updated_at
        FROM operation_templates WHERE app_id = $1 AND name = $2
        "#,
    )
    .bind(app_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Insert a template or overwrite its mutable columns.
pub async fn upsert_template(pool: &PgPool, template: &OperationTemplateRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO operation_templates (id, app_id, name, expression, pre_hook, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name,
            expression = EXCLUDED.expression,
            pre_hook = EXCLUDED.pre_hook,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(template.id)
    .bind(template.app_id)
    .bind(&template.name)
    .bind(&template.expression)
    .bind(&template.pre_hook)
    .bind(template.created_at)
    .bind(template.updated_at)
    .execute(pool)
    .await
    .map_err(DbError::from_write)?;

    Ok(())
}

// ---------------------------------------------------------------------------
// operation_restrictions
// ---------------------------------------------------------------------------

/// All restrictions owned by a template.
pub async fn list_restrictions(pool: &PgPool, template_id: Uuid) -> Result<Vec<RestrictionRow>, DbError> {
    let rows = sqlx::query_as::<_, RestrictionRow>(
        r#"
        SELECT id, operation_template_id, env_id, quota, limit_cycle
        FROM operation_restrictions WHERE operation_template_id = $1
        "#,
    )
    .bind(template_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_restriction(pool: &PgPool, restriction: &RestrictionRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO operation_restrictions (id, operation_template_id, env_id, quota, limit_cycle)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(restriction.id)
    .bind(restriction.operation_template_id)
    .bind(restriction.env_id)
    .bind(restriction.limit)
    .bind(&restriction.limit_cycle)
    .execute(pool)
    .await?;

    Ok(())
}

/// Change the limit of an existing restriction.
///
/// Returns [`DbError::NotFound`] if no row was updated.
pub async fn update_restriction_limit(pool: &PgPool, id: Uuid, limit: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE operation_restrictions SET quota = $1 WHERE id = $2")
        .bind(limit)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound { table: "operation_restrictions", id });
    }

    Ok(())
}
