//! actionlog application binary - composition root.
//!
//! 1. Load configuration from TOML, applying CLI and env overrides
//! 2. Initialize tracing
//! 3. Open the SQLite action record store
//! 4. Either run a one-off GC sweep or start the axum API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use actionlog_api::auth::load_or_generate_token;
use actionlog_api::routes;
use actionlog_api::state::AppState;
use actionlog_core::config::ActionLogConfig;
use actionlog_storage::{ActionRecordRepository, Database, GarbageCollector};

use cli::{CliArgs, Command};

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = ActionLogConfig::load_or_default(&config_file);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }
    config.general.port = args.resolve_port(config.general.port);

    init_tracing(&config.general.log_level);
    tracing::info!("Starting actionlog v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }

    let db_path = data_dir.join("actionlog.db");
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    match args.command() {
        Command::Gc => {
            let repo = ActionRecordRepository::new(Arc::new(db));
            let deleted = GarbageCollector::new().sweep(&repo)?;
            tracing::info!(deleted, "Garbage collection finished");
            println!("{}", deleted);
            Ok(())
        }
        Command::Serve => {
            if !config.settings.has_webhook() {
                tracing::info!("No build webhook configured; actions will be logged only");
            }

            let mut state = AppState::new(config.clone(), db)?;
            state.api_token = load_or_generate_token(&data_dir.join("api_token"));

            if let Err(e) = routes::start_server(&config, state).await {
                tracing::error!(
                    port = config.general.port,
                    error = %e,
                    "API server stopped. Is another instance running?"
                );
                return Err(e.into());
            }
            Ok(())
        }
    }
}
