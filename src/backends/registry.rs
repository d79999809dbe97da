//! Backend registry
//!
//! Maps each backend kind to the adapter that reaches it. Production code
//! builds the registry from configuration; tests register fakes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

use super::adapter::{BackendAdapter, PROBE_TIMEOUT};
use super::multipart::MultipartAdapter;
use super::tika::TikaAdapter;
use super::types::{BackendDescriptor, BackendKind};

/// Shortest probe allowed once the warm-up window is nearly spent
const MIN_PROBE_WINDOW: Duration = Duration::from_millis(100);

#[derive(Clone, Default)]
pub struct BackendRegistry {
    adapters: HashMap<BackendKind, Arc<dyn BackendAdapter>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every backend from configuration
    pub fn from_config(config: &Config) -> Self {
        let timeout = config.backends.request_timeout;
        let mut registry = Self::new();

        registry.register(Arc::new(TikaAdapter::new(
            BackendDescriptor::new(
                BackendKind::Tika,
                config.backend_url(BackendKind::Tika),
                config.is_managed(BackendKind::Tika),
            ),
            timeout,
        )));
        registry.register(Arc::new(MultipartAdapter::pymupdf(
            config.backend_url(BackendKind::PyMuPdf),
            config.is_managed(BackendKind::PyMuPdf),
            timeout,
        )));
        registry.register(Arc::new(MultipartAdapter::unstructured(
            config.backend_url(BackendKind::Unstructured),
            config.is_managed(BackendKind::Unstructured),
            timeout,
        )));

        registry
    }

    /// Register (or replace) the adapter for its backend kind
    pub fn register(&mut self, adapter: Arc<dyn BackendAdapter>) {
        self.adapters.insert(adapter.kind(), adapter);
    }

    pub fn with(mut self, adapter: Arc<dyn BackendAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// Drop backends the gateway cannot use, e.g. ones that were never provisioned
    pub fn exclude(&mut self, kinds: &[BackendKind]) {
        for kind in kinds {
            if self.adapters.remove(kind).is_some() {
                tracing::warn!(backend = kind.name(), "Starting degraded: backend was not provisioned");
            }
        }
    }

    pub fn get(&self, kind: BackendKind) -> Option<Arc<dyn BackendAdapter>> {
        self.adapters.get(&kind).cloned()
    }

    /// Descriptors in a stable order
    pub fn descriptors(&self) -> Vec<BackendDescriptor> {
        BackendKind::ALL
            .iter()
            .filter_map(|kind| self.adapters.get(kind))
            .map(|adapter| adapter.descriptor().clone())
            .collect()
    }

    /// Probe every registered backend once, concurrently.
    ///
    /// Returns the kinds that did not answer.
    pub async fn health_check_all(&self) -> Vec<BackendKind> {
        self.probe_all(PROBE_TIMEOUT).await
    }

    /// Like `health_check_all`, counting a probe slower than `limit` as unhealthy
    async fn probe_all(&self, limit: Duration) -> Vec<BackendKind> {
        let probes = BackendKind::ALL
            .iter()
            .filter_map(|kind| self.adapters.get(kind).cloned())
            .map(|adapter| async move {
                let healthy = tokio::time::timeout(limit, adapter.health_check())
                    .await
                    .unwrap_or(false);
                (adapter.kind(), healthy)
            });

        futures::future::join_all(probes)
            .await
            .into_iter()
            .filter(|(_, healthy)| !healthy)
            .map(|(kind, _)| kind)
            .collect()
    }

    /// Poll until every backend is healthy or `wait` has elapsed.
    ///
    /// Returns the backends still unhealthy when the window closed.
    pub async fn wait_until_healthy(&self, wait: Duration) -> Vec<BackendKind> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let limit = remaining.clamp(MIN_PROBE_WINDOW, PROBE_TIMEOUT);
            let unhealthy = self.probe_all(limit).await;
            if unhealthy.is_empty() {
                return unhealthy;
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return unhealthy;
            }
            tracing::debug!(?unhealthy, "Waiting for backends to become healthy");
            tokio::time::sleep(Duration::from_secs(1).min(remaining)).await;
        }
    }
}
