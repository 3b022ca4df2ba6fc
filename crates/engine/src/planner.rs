//! Directive plan builder.
//!
//! Walks a template's steps in order, asks the factory for one directive per
//! machine per step, persists them, links each machine's chain through
//! [`ChainLinker`], and finally enables the chain heads unless the plan is
//! built on hold. Nothing is executed here.

use std::sync::Arc;

use db::{
    Store,
    models::{DirectiveRow, DirectiveState, OperationRow},
};
use directives::{DirectiveFactory, StepInfo};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{ChainLinker, EngineError, StepSequence};

/// What a plan build produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub directive_count: usize,
    /// Chain heads, one per machine.
    pub top_directive_ids: Vec<Uuid>,
    /// Whether the chain heads were enabled.
    pub enabled: bool,
}

pub struct DirectivePlanBuilder {
    store: Arc<dyn Store>,
    factory: Arc<dyn DirectiveFactory>,
}

impl DirectivePlanBuilder {
    pub fn new(store: Arc<dyn Store>, factory: Arc<dyn DirectiveFactory>) -> Self {
        Self { store, factory }
    }

    /// Build and link the directive plan of `operation`.
    ///
    /// Every directive is created on hold; with `hold == false` the chain
    /// heads move to `enabled` once every step is linked.
    #[instrument(skip(self, steps, machines), fields(operation_id = %operation.id, steps = steps.len()))]
    pub async fn build(
        &self,
        operation: &OperationRow,
        steps: &StepSequence,
        machines: &[Uuid],
        hold: bool,
    ) -> Result<PlanSummary, EngineError> {
        let mut linker = ChainLinker::new();
        let mut directive_count = 0;

        for (step_index, step) in steps.iter().enumerate() {
            let info = StepInfo {
                operation_id: operation.id,
                step_index,
                directive_template_id: step.directive_template_id,
                ignorable_on_failure: step.ignorable_on_failure,
                initial_state: DirectiveState::Hold,
            };

            let produced = self
                .factory
                .make_directives(&info, operation.app_id, machines, &mut |d: &DirectiveRow| linker.observe(d))
                .await?;

            let Some(produced) = produced else {
                debug!("step {} produced nothing, skipped", step_index);
                continue;
            };

            self.store.insert_directives(&produced).await?;
            for link in linker.take_links() {
                link.apply(self.store.as_ref()).await?;
            }
            directive_count += produced.len();
        }

        let top_directive_ids = linker.heads().to_vec();
        let enabled = !hold && !top_directive_ids.is_empty();
        if enabled {
            self.store
                .update_directive_states(&top_directive_ids, DirectiveState::Enabled)
                .await?;
        }

        info!(
            "planned {} directives, {} chain heads (enabled={})",
            directive_count,
            top_directive_ids.len(),
            enabled
        );

        Ok(PlanSummary {
            directive_count,
            top_directive_ids,
            enabled,
        })
    }
}
