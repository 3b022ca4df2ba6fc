//! Factory-level error type.

use thiserror::Error;
use uuid::Uuid;

/// Errors returned by [`crate::DirectiveFactory::make_directives`].
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The directive template belongs to another app.
    #[error("directive template {template_id} does not belong to app {app_id}")]
    ForeignTemplate { template_id: Uuid, app_id: Uuid },

    /// Looking the directive template up failed.
    #[error("failed to load directive template: {0}")]
    Store(#[from] db::DbError),

    /// The template could not be compiled for these machines.
    #[error("failed to compile directive template {template_id}: {message}")]
    Compile { template_id: Uuid, message: String },
}
