//! `MemoryStore`: an in-process [`Store`] for tests and local runs.
//!
//! Holds every table in a single mutex-guarded struct; each trait call takes
//! the lock once, so writes are immediately visible to the next read.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    DbError, Store,
    models::{
        DirectiveRow, DirectiveState, DirectiveTemplateRow, MachineOperationRow, OperationRow,
        OperationState, OperationTemplateRow, RestrictionRow,
    },
};

#[derive(Debug, Clone)]
struct MachineEntry {
    id: Uuid,
    app_id: Uuid,
    env_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
struct Grant {
    user_id: Uuid,
    machine_id: Uuid,
    template_id: Option<Uuid>,
}

#[derive(Debug, Default)]
struct Tables {
    templates: Vec<OperationTemplateRow>,
    restrictions: Vec<RestrictionRow>,
    environments: HashMap<Uuid, Uuid>,
    machines: Vec<MachineEntry>,
    grants: Vec<Grant>,
    operations: Vec<OperationRow>,
    machine_operations: Vec<MachineOperationRow>,
    directives: Vec<DirectiveRow>,
    directive_templates: HashMap<Uuid, DirectiveTemplateRow>,
}

/// In-memory store. Machines are returned in registration order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Seeding
    // -----------------------------------------------------------------------

    /// Register a new environment under `app_id` and return its id.
    pub fn add_environment(&self, app_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.tables().environments.insert(id, app_id);
        id
    }

    /// Register a new machine and return its id.
    pub fn add_machine(&self, app_id: Uuid, env_id: Option<Uuid>) -> Uuid {
        let id = Uuid::new_v4();
        self.tables().machines.push(MachineEntry { id, app_id, env_id });
        id
    }

    /// Let `user_id` operate on `machine_id`, for one template or for all (`None`).
    pub fn grant(&self, user_id: Uuid, machine_id: Uuid, template_id: Option<Uuid>) {
        self.tables().grants.push(Grant { user_id, machine_id, template_id });
    }

    /// Register a directive template and return its id.
    pub fn add_directive_template(&self, app_id: Uuid, name: &str, pluggable: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.tables().directive_templates.insert(
            id,
            DirectiveTemplateRow {
                id,
                app_id,
                name: name.to_owned(),
                pluggable,
            },
        );
        id
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Every operation, in creation order.
    pub fn operations(&self) -> Vec<OperationRow> {
        self.tables().operations.clone()
    }

    /// Every machine-operation row, in creation order.
    pub fn machine_operations(&self) -> Vec<MachineOperationRow> {
        self.tables().machine_operations.clone()
    }

    /// Every directive, in creation order.
    pub fn directives(&self) -> Vec<DirectiveRow> {
        self.tables().directives.clone()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_template(&self, id: Uuid) -> Result<Option<OperationTemplateRow>, DbError> {
        Ok(self.tables().templates.iter().find(|t| t.id == id).cloned())
    }

    async fn find_template_by_name(
        &self,
        app_id: Uuid,
        name: &str,
    ) -> Result<Option<OperationTemplateRow>, DbError> {
        Ok(self
            .tables()
            .templates
            .iter()
            .find(|t| t.app_id == app_id && t.name == name)
            .cloned())
    }

    async fn upsert_template(&self, template: &OperationTemplateRow) -> Result<(), DbError> {
        let mut tables = self.tables();
        match tables.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template.clone(),
            None => tables.templates.push(template.clone()),
        }
        Ok(())
    }

    async fn list_restrictions(&self, template_id: Uuid) -> Result<Vec<RestrictionRow>, DbError> {
        Ok(self
            .tables()
            .restrictions
            .iter()
            .filter(|r| r.operation_template_id == template_id)
            .cloned()
            .collect())
    }

    async fn insert_restriction(&self, restriction: &RestrictionRow) -> Result<(), DbError> {
        self.tables().restrictions.push(restriction.clone());
        Ok(())
    }

    async fn update_restriction_limit(&self, id: Uuid, limit: i64) -> Result<(), DbError> {
        let mut tables = self.tables();
        let restriction = tables
            .restrictions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(DbError::NotFound { table: "operation_restrictions", id })?;
        restriction.limit = limit;
        Ok(())
    }

    async fn app_environments(&self, app_id: Uuid) -> Result<Vec<Uuid>, DbError> {
        Ok(self
            .tables()
            .environments
            .iter()
            .filter(|(_, app)| **app == app_id)
            .map(|(env, _)| *env)
            .collect())
    }

    async fn machine_environments(
        &self,
        machine_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Option<Uuid>>, DbError> {
        Ok(self
            .tables()
            .machines
            .iter()
            .filter(|m| machine_ids.contains(&m.id))
            .map(|m| (m.id, m.env_id))
            .collect())
    }

    async fn available_machines(
        &self,
        user_id: Uuid,
        app_id: Uuid,
        template_id: Uuid,
    ) -> Result<Vec<Uuid>, DbError> {
        let tables = self.tables();
        Ok(tables
            .machines
            .iter()
            .filter(|m| m.app_id == app_id)
            .filter(|m| {
                tables.grants.iter().any(|g| {
                    g.user_id == user_id
                        && g.machine_id == m.id
                        && g.template_id.map_or(true, |t| t == template_id)
                })
            })
            .map(|m| m.id)
            .collect())
    }

    async fn insert_operation(&self, operation: &OperationRow) -> Result<(), DbError> {
        self.tables().operations.push(operation.clone());
        Ok(())
    }

    async fn find_operation(&self, id: Uuid) -> Result<Option<OperationRow>, DbError> {
        Ok(self.tables().operations.iter().find(|o| o.id == id).cloned())
    }

    async fn update_operation_state(
        &self,
        id: Uuid,
        state: OperationState,
    ) -> Result<(), DbError> {
        let mut tables = self.tables();
        let operation = tables
            .operations
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(DbError::NotFound { table: "operations", id })?;
        operation.state = state;
        Ok(())
    }

    async fn insert_machine_operations(
        &self,
        rows: &[MachineOperationRow],
    ) -> Result<(), DbError> {
        self.tables().machine_operations.extend_from_slice(rows);
        Ok(())
    }

    async fn machine_operation_counts(
        &self,
        template_id: Uuid,
    ) -> Result<HashMap<Uuid, i64>, DbError> {
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for row in self
            .tables()
            .machine_operations
            .iter()
            .filter(|r| r.operation_template_id == template_id)
        {
            *counts.entry(row.machine_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_directives(&self, rows: &[DirectiveRow]) -> Result<(), DbError> {
        self.tables().directives.extend_from_slice(rows);
        Ok(())
    }

    async fn set_directive_pre(&self, id: Uuid, pre_id: Uuid) -> Result<(), DbError> {
        let mut tables = self.tables();
        let directive = tables
            .directives
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(DbError::NotFound { table: "directives", id })?;
        directive.pre_id = Some(pre_id);
        Ok(())
    }

    async fn set_directive_next(&self, id: Uuid, next_id: Uuid) -> Result<(), DbError> {
        let mut tables = self.tables();
        let directive = tables
            .directives
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or(DbError::NotFound { table: "directives", id })?;
        directive.next_id = Some(next_id);
        Ok(())
    }

    async fn update_directive_states(
        &self,
        ids: &[Uuid],
        state: DirectiveState,
    ) -> Result<(), DbError> {
        for directive in self.tables().directives.iter_mut().filter(|d| ids.contains(&d.id)) {
            directive.state = state;
        }
        Ok(())
    }

    async fn list_directives(&self, operation_id: Uuid) -> Result<Vec<DirectiveRow>, DbError> {
        let mut rows: Vec<DirectiveRow> = self
            .tables()
            .directives
            .iter()
            .filter(|d| d.operation_id == operation_id)
            .cloned()
            .collect();
        // Stable sort keeps creation order within a step.
        rows.sort_by_key(|d| d.step_index);
        Ok(rows)
    }

    async fn find_directive_template(
        &self,
        id: Uuid,
    ) -> Result<Option<DirectiveTemplateRow>, DbError> {
        Ok(self.tables().directive_templates.get(&id).cloned())
    }
}
