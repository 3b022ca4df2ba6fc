//! [`Store`] backed by Postgres, delegating to the repository functions.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    DbError, DbPool, Store,
    models::{
        DirectiveRow, DirectiveState, DirectiveTemplateRow, MachineOperationRow, OperationRow,
        OperationState, OperationTemplateRow, RestrictionRow,
    },
    repository::{directives, machines, operations, templates},
};

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_template(&self, id: Uuid) -> Result<Option<OperationTemplateRow>, DbError> {
        templates::get_template(&self.pool, id).await
    }

    async fn find_template_by_name(
        &self,
        app_id: Uuid,
        name: &str,
    ) -> Result<Option<OperationTemplateRow>, DbError> {
        templates::get_template_by_name(&self.pool, app_id, name).await
    }

    async fn upsert_template(&self, template: &OperationTemplateRow) -> Result<(), DbError> {
        templates::upsert_template(&self.pool, template).await
    }

    async fn list_restrictions(&self, template_id: Uuid) -> Result<Vec<RestrictionRow>, DbError> {
        templates::list_restrictions(&self.pool, template_id).await
    }

    async fn insert_restriction(&self, restriction: &RestrictionRow) -> Result<(), DbError> {
        templates::insert_restriction(&self.pool, restriction).await
    }

    async fn update_restriction_limit(&self, id: Uuid, limit: i64) -> Result<(), DbError> {
        templates::update_restriction_limit(&self.pool, id, limit).await
    }

    async fn app_environments(&self, app_id: Uuid) -> Result<Vec<Uuid>, DbError> {
        machines::list_app_environments(&self.pool, app_id).await
    }

    async fn machine_environments(
        &self,
        machine_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Option<Uuid>>, DbError> {
        machines::machine_environments(&self.pool, machine_ids).await
    }

    async fn available_machines(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        template_id: Uuid,
    ) -> Result<Vec<Uuid>, DbError> {
        machines::available_machines(&self.pool, user_id, app_id, template_id).await
    }

    async fn insert_operation(&self, operation: &OperationRow) -> Result<(), DbError> {
        operations::insert_operation(&self.pool, operation).await
    }

    async fn find_operation(&self, id: Uuid) -> Result<Option<OperationRow>, DbError> {
        operations::get_operation(&self.pool, id).await
    }

    async fn update_operation_state(
        &self,
        id: Uuid,
        state: OperationState,
    ) -> Result<(), DbError> {
        operations::update_operation_state(&self.pool, id, state).await
    }

    async fn insert_machine_operations(
        &self,
        rows: &[MachineOperationRow],
    ) -> Result<(), DbError> {
        operations::insert_machine_operations(&self.pool, rows).await
    }

    async fn machine_operation_counts(
        &self,
        template_id: Uuid,
    ) -> Result<HashMap<Uuid, i64>, DbError> {
        operations::machine_operation_counts(&self.pool, template_id).await
    }

    async fn insert_directives(&self, rows: &[DirectiveRow]) -> Result<(), DbError> {
        directives::insert_directives(&self.pool, rows).await
    }

    async fn set_directive_pre(&self, id: Uuid, pre_id: Uuid) -> Result<(), DbError> {
        directives::set_pre_id(&self.pool, id, pre_id).await
    }

    async fn set_directive_next(&self, id: Uuid, next_id: Uuid) -> Result<(), DbError> {
        directives::set_next_id(&self.pool, id, next_id).await
    }

    async fn update_directive_states(
        &self,
        ids: &[Uuid],
        state: DirectiveState,
    ) -> Result<(), DbError> {
        directives::update_states(&self.pool, ids, state).await
    }

    async fn list_directives(&self, operation_id: Uuid) -> Result<Vec<DirectiveRow>, DbError> {
        directives::list_for_operation(&self.pool, operation_id).await
    }

    async fn find_directive_template(
        &self,
        id: Uuid,
    ) -> Result<Option<DirectiveTemplateRow>, DbError> {
        directives::get_directive_template(&self.pool, id).await
    }
}
