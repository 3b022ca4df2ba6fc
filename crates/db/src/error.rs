//! Typed error type for the db crate.

use thiserror::Error;
use uuid::Uuid;

/// Postgres SQLSTATE for a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{table} row {id} not found")]
    NotFound { table: &'static str, id: Uuid },

    /// A write collided with a unique constraint (named when Postgres reports it).
    #[error("duplicate value violates unique constraint {0}")]
    Duplicate(String),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Like the `From` conversion, but turns unique violations into [`DbError::Duplicate`].
    pub fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return Self::Duplicate(db_err.constraint().unwrap_or("unknown").to_owned());
            }
        }
        Self::Sqlx(err)
    }
}
