//! Application state management

use std::sync::Arc;
use std::time::Instant;

use crate::backends::BackendRegistry;
use crate::cache::{MemoryCache, ResultCache};
use crate::config::Config;
use crate::parse::{ParseService, ParseServiceConfig};
use crate::pipeline::JobRegistry;
use crate::supervisor::{StartReport, Supervisor};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    parser: ParseService,
    supervisor: Arc<Supervisor>,
    started_at: Instant,
}

impl AppState {
    /// Create the state from injected collaborators
    pub fn new(
        config: Config,
        cache: Arc<dyn ResultCache>,
        backends: BackendRegistry,
        supervisor: Arc<Supervisor>,
    ) -> Self {
        let parser = ParseService::new(
            ParseServiceConfig::from(&config),
            cache,
            backends,
            JobRegistry::new(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                parser,
                supervisor,
                started_at: Instant::now(),
            }),
        }
    }

    /// Production wiring: in-memory cache and HTTP adapters from config.
    ///
    /// Backends the supervisor could not provision are left out, so requests
    /// routed to them answer `backend_unavailable`.
    pub fn from_config(config: Config, supervisor: Arc<Supervisor>, report: &StartReport) -> Self {
        let cache = Arc::new(MemoryCache::new(config.cache.ttl, config.cache.max_entries));
        let mut backends = BackendRegistry::from_config(&config);
        backends.exclude(&report.unprovisioned);
        Self::new(config, cache, backends, supervisor)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the parse service
    pub fn parser(&self) -> &ParseService {
        &self.inner.parser
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.inner.supervisor
    }

    /// Seconds since the state was created
    pub fn uptime_secs(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }
}
