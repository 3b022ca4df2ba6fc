//! `fleet-orchestrator` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the API server.
//! - `migrate`: run pending database migrations.
//! - `validate`: check an operation template draft offline.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fleet-orchestrator",
    about = "Operation template admission and scheduling for machine fleets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST API server.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
        #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 10)]
        max_connections: u32,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
    /// Validate an operation template draft JSON file.
    Validate {
        /// Path to the template JSON file.
        path: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            bind,
            database_url,
            max_connections,
        } => {
            let pool = db::pool::create_pool(&database_url, max_connections)
                .await
                .context("failed to connect to database")?;

            let store: Arc<dyn db::Store> = Arc::new(db::PgStore::new(pool.clone()));
            let orchestrator = engine::Orchestrator::new(
                store.clone(),
                Arc::new(directives::CatalogFactory::new(store)),
                Arc::new(queue::PgJobDispatcher::new(pool)),
                engine::HookRegistry::with_builtin(),
                engine::EngineConfig::default(),
            );

            info!("Starting API server on {bind}");
            api::serve(
                &bind,
                api::AppState {
                    orchestrator: Arc::new(orchestrator),
                },
            )
            .await
            .context("server error")?;
        }
        Command::Migrate { database_url } => {
            info!("Running migrations");
            let pool = db::pool::create_pool(&database_url, 2)
                .await
                .context("failed to connect to database")?;
            db::pool::run_migrations(&pool)
                .await
                .context("migration failed")?;
            info!("Migrations applied successfully");
        }
        Command::Validate { path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("cannot read file {}", path.display()))?;

            let draft: engine::TemplateDraft =
                serde_json::from_str(&content).context("invalid template JSON")?;

            match draft.validate() {
                Ok(()) => {
                    let expression = engine::StepSequence::from(draft.steps).encode();
                    println!("✅ Template '{}' is valid. Steps: {expression}", draft.name.trim());
                }
                Err(e) => {
                    eprintln!("❌ Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
