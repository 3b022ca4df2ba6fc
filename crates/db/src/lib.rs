//! `db` crate: persistence layer for the orchestration core.
//!
//! Provides typed row structs, the [`Store`] contract the engine talks to,
//! a Postgres implementation assembled from per-table repository functions,
//! and an in-memory implementation for tests and local runs.
//! No gating or linking logic lives here.

pub mod error;
pub mod memory;
pub mod models;
pub mod pool;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::DbError;
pub use memory::MemoryStore;
pub use pool::DbPool;
pub use postgres::PgStore;
pub use store::Store;
