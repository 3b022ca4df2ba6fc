//! Repository functions: one function per database operation.
//!
//! Every function takes a `&PgPool` and returns a `Result<T, DbError>`.
//! No orchestration logic, just SQL.

pub mod directives;
pub mod jobs;
pub mod machines;
pub mod operations;
pub mod templates;
