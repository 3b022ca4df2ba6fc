//! The `DirectiveFactory` trait: the contract every directive compiler must fulfil.

use async_trait::async_trait;
use db::models::{DirectiveRow, DirectiveState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::FactoryError;

/// Everything the factory needs to know about the step being compiled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub operation_id: Uuid,
    /// Position of the step in the template's step list.
    pub step_index: usize,
    pub directive_template_id: Uuid,
    /// A failure of this step should not stop the machine's chain.
    pub ignorable_on_failure: bool,
    /// State every produced directive starts in.
    pub initial_state: DirectiveState,
}

/// Turns one template step into one directive per machine.
#[async_trait]
pub trait DirectiveFactory: Send + Sync {
    /// Compile the step for `machines` of `app_id`.
    ///
    /// `on_created` is invoked once per directive, in machine order, as soon as
    /// that directive exists. The returned vector holds the same directives in
    /// the same order. Returns `Ok(None)` when the directive template no longer
    /// exists; the caller skips the step.
    ///
    /// Directives are returned unsaved; persisting them is the caller's job.
    async fn make_directives(
        &self,
        info: &StepInfo,
        app_id: Uuid,
        machines: &[Uuid],
        on_created: &mut (dyn for<'r> FnMut(&'r DirectiveRow) + Send),
    ) -> Result<Option<Vec<DirectiveRow>>, FactoryError>;
}
