//! `CatalogFactory`: compiles steps from the `directive_templates` catalog.
//!
//! Templates are looked up through the [`Store`] on every call, so a template
//! created while the process runs is usable by the next plan build.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use db::{
    Store,
    models::{DirectiveRow, DirectiveTemplateRow},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{DirectiveFactory, FactoryError, StepInfo};

pub struct CatalogFactory {
    store: Arc<dyn Store>,
}

impl CatalogFactory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

/// Build one directive per machine from `template`, notifying `on_created` after each.
pub fn compile(
    info: &StepInfo,
    template: &DirectiveTemplateRow,
    machines: &[Uuid],
    on_created: &mut (dyn for<'r> FnMut(&'r DirectiveRow) + Send),
) -> Vec<DirectiveRow> {
    let step_index = i32::try_from(info.step_index).unwrap_or(i32::MAX);
    let mut produced = Vec::with_capacity(machines.len());

    for &machine_id in machines {
        let directive = DirectiveRow {
            id: Uuid::new_v4(),
            operation_id: info.operation_id,
            machine_id,
            directive_template_id: template.id,
            step_index,
            pluggable: template.pluggable,
            ignorable_on_failure: info.ignorable_on_failure,
            state: info.initial_state,
            pre_id: None,
            next_id: None,
            created_at: Utc::now(),
        };
        on_created(&directive);
        produced.push(directive);
    }

    produced
}

#[async_trait]
impl DirectiveFactory for CatalogFactory {
    async fn make_directives(
        &self,
        info: &StepInfo,
        app_id: Uuid,
        machines: &[Uuid],
        on_created: &mut (dyn for<'r> FnMut(&'r DirectiveRow) + Send),
    ) -> Result<Option<Vec<DirectiveRow>>, FactoryError> {
        let Some(template) = self
            .store
            .find_directive_template(info.directive_template_id)
            .await?
        else {
            warn!(
                "directive template {} does not exist, skipping step {}",
                info.directive_template_id, info.step_index
            );
            return Ok(None);
        };

        if template.app_id != app_id {
            return Err(FactoryError::ForeignTemplate {
                template_id: template.id,
                app_id,
            });
        }

        debug!(
            "compiling '{}' for {} machines (step {})",
            template.name,
            machines.len(),
            info.step_index
        );
        Ok(Some(compile(info, &template, machines, on_created)))
    }
}
