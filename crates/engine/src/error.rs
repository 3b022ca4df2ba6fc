//! Engine-level error types.

use thiserror::Error;
use uuid::Uuid;

/// Errors produced by the orchestration core (template save + admission).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Admission rejections ------

    /// None of the requested machines may be operated on by the requester.
    #[error("no permitted machines among the requested ones")]
    NoPermittedMachines,

    /// An environment has reached its restriction limit for this template.
    #[error("quota exceeded for environment {env_id}: {count} of {limit} used")]
    QuotaExceeded { env_id: Uuid, count: i64, limit: i64 },

    /// A registered pre-admission hook refused the operation.
    #[error("pre-admission hook '{hook}' rejected the operation: {reason}")]
    HookRejected { hook: String, reason: String },

    // ------ Template save errors ------

    /// A restriction limit below zero was supplied.
    #[error("restriction limit for environment {env_id} cannot be negative (got {limit})")]
    InvalidRestriction { env_id: Uuid, limit: i64 },

    /// A restriction names an environment outside the template's app.
    #[error("environment {0} does not belong to the template's app")]
    UnknownEnvironment(Uuid),

    /// Missing name, duplicate name within an app, or empty step list.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The template names a hook that is not registered.
    #[error("no pre-admission hook registered as '{0}'")]
    UnknownHook(String),

    // ------ Lookup / input errors ------

    #[error("operation template {0} not found")]
    TemplateNotFound(Uuid),

    #[error("operation {0} not found")]
    OperationNotFound(Uuid),

    /// Only `hold` and `wait` operations can be released.
    #[error("operation {operation_id} is in state {state} and cannot be released")]
    NotReleasable {
        operation_id: Uuid,
        state: db::models::OperationState,
    },

    #[error("group count must be at least 1")]
    InvalidGroupCount,

    /// A later group failed after earlier groups were already admitted.
    /// The admitted operations are left in place.
    #[error("group scheduling stopped after {} admitted operation(s): {source}", admitted.len())]
    PartialSchedule {
        admitted: Vec<Uuid>,
        #[source]
        source: Box<EngineError>,
    },

    // ------ Collaborator errors ------

    #[error("directive factory error: {0}")]
    Factory(#[from] directives::FactoryError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] queue::QueueError),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),
}

impl EngineError {
    /// `true` for the outcomes an admission reports as a rejection rather
    /// than a failure: permission, quota and hook refusals.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoPermittedMachines | Self::QuotaExceeded { .. } | Self::HookRejected { .. }
        )
    }
}
