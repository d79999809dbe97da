//! Backend process supervisor
//!
//! Launches the backends this gateway manages (the rest are assumed to be
//! running externally), provisions the Tika jar on first use and kills every
//! child on shutdown.
//!
//! A backend that cannot be provisioned is logged, skipped and reported so
//! the gateway serves without it. A backend that fails to launch is logged
//! and skipped; the startup health pass decides whether the gateway can serve
//! without it.

mod process;
mod provision;

use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::backends::BackendKind;
use crate::config::Config;

pub use process::{ManagedProcess, ProcessInfo, ProcessSpec};
pub use provision::ensure_jar;

/// How long `stop` waits for each child after killing it
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Provisioning failed for {backend}: {message}")]
    ProvisioningFailed { backend: String, message: String },

    #[error("Failed to launch {backend}: {source}")]
    LaunchFailed {
        backend: String,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of `Supervisor::start`
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReport {
    pub started: Vec<BackendKind>,
    /// Backends that were not started, with the reason
    pub failed: Vec<(BackendKind, String)>,
    /// Backends whose runtime assets could not be fetched
    pub unprovisioned: Vec<BackendKind>,
}

/// Where to fetch the Tika jar from when it is missing
#[derive(Debug, Clone)]
pub struct JarSource {
    pub path: PathBuf,
    pub url: String,
}

pub struct Supervisor {
    specs: Vec<ProcessSpec>,
    tika_jar: Option<JarSource>,
    client: reqwest::Client,
    children: Mutex<Vec<ManagedProcess>>,
}

impl Supervisor {
    pub fn new(specs: Vec<ProcessSpec>) -> Self {
        Self {
            specs,
            tika_jar: None,
            client: reqwest::Client::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    /// Supervisor for the backends listed in `MANAGED_BACKENDS`
    pub fn from_config(config: &Config) -> Self {
        let specs = config
            .backends
            .managed
            .iter()
            .map(|kind| ProcessSpec::for_backend(*kind, config))
            .collect();

        Self::new(specs).with_tika_jar(JarSource {
            path: config.backends.tika_jar_path.clone(),
            url: config.backends.tika_jar_url.clone(),
        })
    }

    pub fn with_tika_jar(mut self, source: JarSource) -> Self {
        self.tika_jar = Some(source);
        self
    }

    /// Provision and launch every managed backend.
    ///
    /// Failures are collected in the report rather than returned, so one
    /// broken backend does not keep the others from starting.
    pub async fn start(&self) -> StartReport {
        let mut report = StartReport::default();

        for spec in &self.specs {
            match self.start_one(spec).await {
                Ok(process) => {
                    report.started.push(process.kind());
                    self.children.lock().push(process);
                }
                Err(e) => {
                    tracing::error!(backend = spec.kind.name(), "{}", e);
                    if matches!(e, SupervisorError::ProvisioningFailed { .. }) {
                        report.unprovisioned.push(spec.kind);
                    }
                    report.failed.push((spec.kind, e.to_string()));
                }
            }
        }

        if !self.specs.is_empty() {
            tracing::info!(
                started = report.started.len(),
                failed = report.failed.len(),
                "Supervisor start complete"
            );
        }
        report
    }

    async fn start_one(&self, spec: &ProcessSpec) -> Result<ManagedProcess, SupervisorError> {
        if spec.kind == BackendKind::Tika {
            if let Some(jar) = &self.tika_jar {
                ensure_jar(&self.client, &jar.path, &jar.url).await?;
            }
        }
        ManagedProcess::launch(spec)
    }

    /// Kill every child and wait (bounded) for each to exit
    pub async fn stop(&self) {
        let children: Vec<ManagedProcess> = self.children.lock().drain(..).collect();
        if children.is_empty() {
            return;
        }

        tracing::info!(count = children.len(), "Stopping backend processes");
        futures::future::join_all(children.into_iter().map(|child| child.stop(STOP_GRACE))).await;
    }

    /// Children still owned by the supervisor
    pub fn running(&self) -> Vec<ProcessInfo> {
        let mut children = self.children.lock();
        children
            .iter_mut()
            .filter_map(|child| child.is_alive().then(|| child.info()))
            .collect()
    }
}
