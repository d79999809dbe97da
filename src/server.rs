//! Gateway startup
//!
//! Backends are health-checked before anything listens: if one stays
//! unhealthy through the warm-up window the gateway refuses to start and the
//! port is never bound. Backends left out of the registry (never provisioned)
//! are not checked.

use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use crate::backends::BackendRegistry;
use crate::error::AppError;
use crate::routes;
use crate::state::AppState;

/// A gateway that passed its health pass and holds its listening socket
pub struct Server {
    listener: TcpListener,
    app: Router,
}

impl Server {
    /// Health-check every backend, then bind the configured address.
    pub async fn start(state: AppState) -> anyhow::Result<Self> {
        let config = state.config();
        ensure_healthy(state.parser().backends(), config.server.health_wait).await?;

        let addr = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        Ok(Self {
            listener,
            app: routes::app(state),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        tracing::info!("Parse gateway listening on {}", addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .context("Server error")?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Fail with `BackendUnavailable` naming every backend still down after `wait`
pub async fn ensure_healthy(
    backends: &BackendRegistry,
    wait: std::time::Duration,
) -> Result<(), AppError> {
    tracing::info!(wait_secs = wait.as_secs(), "Checking backend health");
    let unhealthy = backends.wait_until_healthy(wait).await;

    if unhealthy.is_empty() {
        for descriptor in backends.descriptors() {
            tracing::info!(backend = descriptor.name, url = %descriptor.base_url, "Backend healthy");
        }
        return Ok(());
    }

    for kind in &unhealthy {
        tracing::error!(backend = kind.name(), "Backend failed its health check");
    }
    Err(AppError::BackendUnavailable {
        backend: unhealthy
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", "),
        message: "health check failed at startup".to_string(),
    })
}
