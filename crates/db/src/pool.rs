//! Postgres connection pool and embedded migrations.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::DbError;

/// Shared pool type; `PgStore` and `PgJobDispatcher` both hold a clone.
pub type DbPool = PgPool;

/// How long a caller waits for a free connection before the query fails.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `database_url` with at most `max_connections` open connections.
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<DbPool, DbError> {
    info!(
        "Connecting to {} (max_connections={})",
        redact(database_url),
        max_connections
    );
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Apply the schema in `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database schema is up to date");
    Ok(())
}

/// Drop the credentials from a connection URL before it is logged.
fn redact(database_url: &str) -> &str {
    match database_url.rsplit_once('@') {
        Some((_, host)) => host,
        None => database_url,
    }
}
