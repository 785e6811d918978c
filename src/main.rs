use std::sync::Arc;

use anyhow::Context;

use simple_bank::config::AppConfig;
use simple_bank::db::Database;
use simple_bank::gateway::{self, state::AppState};
use simple_bank::{logging, token};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = logging::init_logging(&app_config);

    tracing::info!(env = %env, "Starting simple_bank");

    // Key problems are fatal at startup, never per request
    let token_maker =
        token::maker_from_config(&app_config.token).context("Failed to create token maker")?;

    let db = Database::connect(
        &app_config.postgres_url,
        app_config.postgres_max_connections,
    )
    .await
    .context("Failed to connect to PostgreSQL")?;
    db.run_migrations()
        .await
        .context("Failed to run database migrations")?;

    let state = Arc::new(AppState::new(
        Arc::new(db),
        token_maker,
        app_config.token.clone(),
        app_config.gateway.transfer_timeout(),
    ));

    gateway::run_server(&app_config.gateway, state).await
}
