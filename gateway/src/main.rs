//! Unified REST + WebSocket gateway binary (§6): the only crate in this
//! workspace that speaks HTTP.

mod error;
mod rest;
mod state;
mod ws;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use operator_core::config::Config;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Debug, Parser)]
#[command(name = "operator-gateway", about = "Operator REST + WebSocket gateway")]
struct Cli {
    /// Overrides API_PORT / PORT.
    #[arg(long, env = "API_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    operator_core::logging::init();
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.api_port = port;
    }

    let state = AppState::bootstrap(config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.api_port));

    let app = Router::new()
        .route("/api/v1/health", get(rest::health))
        .route("/api/v1/status", get(rest::status))
        .route("/api/v1/intent", post(rest::submit_intent))
        .route("/api/v1/executions", get(rest::list_executions))
        .route("/api/v1/executions/:id", get(rest::get_execution))
        .route("/api/v1/hubs", get(rest::list_hubs))
        .route("/api/v1/hubs/:id", get(rest::get_hub))
        .route("/api/v1/hubs/:id/workflows", get(rest::get_hub_workflows))
        .route("/api/v1/hubs/:id/execute", post(rest::execute_hub_workflow))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    tracing::info!(%addr, "operator-gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
