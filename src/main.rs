//! Parse Gateway Server
//!
//! Starts managed backends, waits for every backend to become healthy, then
//! serves the parse API until Ctrl+C or SIGTERM.

use std::sync::Arc;

use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parse_gateway::config::Config;
use parse_gateway::server::Server;
use parse_gateway::state::AppState;
use parse_gateway::supervisor::Supervisor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parse_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing::info!("Starting Parse Gateway v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Tika: {}", config.backends.tika_url);
    tracing::info!("PyMuPDF: {}", config.backends.pymupdf_url);
    tracing::info!("Unstructured: {}", config.backends.unstructured_url);
    tracing::info!("Upload dir: {}", config.upload.dir.display());

    // Launch managed backends
    let supervisor = Arc::new(Supervisor::from_config(&config));
    let report = supervisor.start().await;

    let state = AppState::from_config(config, supervisor.clone(), &report);
    let jobs = state.parser().jobs().clone();

    let server = match Server::start(state).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Gateway failed to start: {:#}", e);
            supervisor.stop().await;
            return Err(e);
        }
    };

    let served = server.run(shutdown_signal()).await;

    let cancelled = jobs.cancel_all();
    if cancelled > 0 {
        tracing::info!(cancelled, "Cancelled unfinished jobs");
    }
    supervisor.stop().await;

    served
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
