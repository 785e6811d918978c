//! REST gateway
//!
//! ```text
//! public     GET  /health
//!            POST /users
//!            POST /users/login
//!            POST /tokens/renew_access
//! bearer     POST /accounts          GET /accounts?offset&limit
//!            GET  /accounts/{id}     DELETE /accounts/{id}
//!            POST /transfers
//! ```

pub mod handlers;
pub mod middleware;
pub mod state;
pub mod types;
pub mod validation;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // Bearer-protected routes; route_layer keeps unknown paths at 404
    let protected_routes = Router::new()
        .route(
            "/accounts",
            post(handlers::create_account).get(handlers::list_accounts),
        )
        .route(
            "/accounts/{id}",
            get(handlers::get_account).delete(handlers::delete_account),
        )
        .route("/transfers", post(handlers::create_transfer))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/users", post(handlers::create_user))
        .route("/users/login", post(handlers::login_user))
        .route("/tokens/renew_access", post(handlers::renew_access_token))
        .merge(protected_routes)
        .with_state(state)
}

/// Start HTTP Gateway server; returns after a graceful shutdown (Ctrl-C)
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {}: {} (port {} may already be in use)",
            addr,
            e,
            config.port
        )
    })?;

    tracing::info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
