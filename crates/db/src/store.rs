//! The `Store` trait: every read and write the orchestration core performs.
//!
//! Implementations are assumed immediately consistent: a write that returned
//! `Ok` is visible to the next read from any caller.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    DbError,
    models::{
        DirectiveRow, DirectiveState, DirectiveTemplateRow, MachineOperationRow, OperationRow,
        OperationState, OperationTemplateRow, RestrictionRow,
    },
};

#[async_trait]
pub trait Store: Send + Sync {
    // ------ operation_templates ------

    async fn find_template(&self, id: Uuid) -> Result<Option<OperationTemplateRow>, DbError>;

    async fn find_template_by_name(
        &self,
        app_id: Uuid,
        name: &str,
    ) -> Result<Option<OperationTemplateRow>, DbError>;

    /// Insert the template, or overwrite the row with the same `id`.
    async fn upsert_template(&self, template: &OperationTemplateRow) -> Result<(), DbError>;

    // ------ operation_restrictions ------

    async fn list_restrictions(&self, template_id: Uuid) -> Result<Vec<RestrictionRow>, DbError>;

    async fn insert_restriction(&self, restriction: &RestrictionRow) -> Result<(), DbError>;

    async fn update_restriction_limit(&self, id: Uuid, limit: i64) -> Result<(), DbError>;

    // ------ environments / machines ------

    /// Environment ids that belong to `app_id`.
    async fn app_environments(&self, app_id: Uuid) -> Result<Vec<Uuid>, DbError>;

    /// Environment of each known machine. Unknown ids are absent from the map;
    /// machines without an environment map to `None`.
    async fn machine_environments(
        &self,
        machine_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Option<Uuid>>, DbError>;

    /// Machines `user_id` may operate on for this app/template, in a stable order.
    async fn available_machines(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        template_id: Uuid,
    ) -> Result<Vec<Uuid>, DbError>;

    // ------ operations ------

    async fn insert_operation(&self, operation: &OperationRow) -> Result<(), DbError>;

    async fn find_operation(&self, id: Uuid) -> Result<Option<OperationRow>, DbError>;

    async fn update_operation_state(&self, id: Uuid, state: OperationState)
        -> Result<(), DbError>;

    // ------ machine_operations ------

    async fn insert_machine_operations(&self, rows: &[MachineOperationRow])
        -> Result<(), DbError>;

    /// Number of machine-operation rows per machine ever recorded under `template_id`.
    async fn machine_operation_counts(
        &self,
        template_id: Uuid,
    ) -> Result<HashMap<Uuid, i64>, DbError>;

    // ------ directives ------

    async fn insert_directives(&self, rows: &[DirectiveRow]) -> Result<(), DbError>;

    async fn set_directive_pre(&self, id: Uuid, pre_id: Uuid) -> Result<(), DbError>;

    async fn set_directive_next(&self, id: Uuid, next_id: Uuid) -> Result<(), DbError>;

    async fn update_directive_states(
        &self,
        ids: &[Uuid],
        state: DirectiveState,
    ) -> Result<(), DbError>;

    /// All directives of an operation ordered by step, then machine.
    async fn list_directives(&self, operation_id: Uuid) -> Result<Vec<DirectiveRow>, DbError>;

    // ------ directive_templates ------

    /// Read on every plan build, so templates created at runtime are visible.
    async fn find_directive_template(&self, id: Uuid)
        -> Result<Option<DirectiveTemplateRow>, DbError>;
}
