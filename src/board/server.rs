use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState};
use super::dnd::BoardController;
use super::orchestrator::MoveOrchestrator;
use super::store::BoardStore;
use super::ws;

/// Configuration for the board server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
    /// Open the board in a browser once listening.
    pub open_browser: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3180,
            dev_mode: false,
            open_browser: false,
        }
    }
}

/// Build the application state around an already-constructed orchestrator.
pub fn build_state(orchestrator: Arc<MoveOrchestrator>) -> Arc<AppState> {
    let (ws_tx, _rx) = broadcast::channel::<String>(256);
    let store: BoardStore = orchestrator.store().clone();
    Arc::new(AppState {
        store,
        controller: Arc::new(BoardController::new(orchestrator)),
        ws_tx,
    })
}

/// Build the full application router with API and WebSocket.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Start the board server. Loads the board, subscribes to changes and
/// serves until Ctrl+C.
pub async fn start_server(config: ServerConfig, orchestrator: Arc<MoveOrchestrator>) -> Result<()> {
    let state = build_state(orchestrator);
    let forwarder = ws::spawn_forwarder(state.store.clone(), state.ws_tx.clone());

    // A failed initial load is reported as a notice; the board can be
    // reloaded later.
    if state.store.start().await.is_err() {
        tracing::warn!("Initial board load failed; serving an empty board");
    }

    let mut app = build_router(state.clone());
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!("Newsboard running at http://{}", local_addr);
    println!("Newsboard running at http://{}", local_addr);

    if config.open_browser {
        let url = format!("http://{}/api/board", local_addr);
        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error");

    state.store.shutdown();
    forwarder.abort();
    served?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    println!("\nShutting down...");
}
