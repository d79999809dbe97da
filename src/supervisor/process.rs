//! Child process launch and teardown

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

use crate::backends::BackendKind;
use crate::config::Config;

use super::SupervisorError;

const DEFAULT_TIKA_PORT: u16 = 9998;

/// How to launch one managed backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub kind: BackendKind,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(kind: BackendKind, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args,
            working_dir: None,
        }
    }

    /// Launch command for `kind` as configured
    pub fn for_backend(kind: BackendKind, config: &Config) -> Self {
        let backends = &config.backends;
        match kind {
            BackendKind::Tika => {
                let port = reqwest::Url::parse(&backends.tika_url)
                    .ok()
                    .and_then(|url| url.port_or_known_default())
                    .unwrap_or(DEFAULT_TIKA_PORT);
                Self::new(
                    kind,
                    &backends.java_path,
                    vec![
                        "-jar".to_string(),
                        backends.tika_jar_path.to_string_lossy().into_owned(),
                        "--port".to_string(),
                        port.to_string(),
                    ],
                )
            }
            BackendKind::PyMuPdf | BackendKind::Unstructured => {
                let script = match kind {
                    BackendKind::PyMuPdf => "pymupdf_service.py",
                    _ => "unstructured_service.py",
                };
                let mut spec = Self::new(
                    kind,
                    &backends.python_path,
                    vec![backends.backends_dir.join(script).to_string_lossy().into_owned()],
                );
                spec.working_dir = Some(backends.backends_dir.clone());
                spec
            }
        }
    }
}

/// Snapshot of a running child for status reporting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub backend: &'static str,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
}

/// A backend child process owned by the supervisor
pub struct ManagedProcess {
    kind: BackendKind,
    child: Child,
    started_at: DateTime<Utc>,
}

impl ManagedProcess {
    /// Spawn the child and forward its output to the log
    pub fn launch(spec: &ProcessSpec) -> Result<Self, SupervisorError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| SupervisorError::LaunchFailed {
            backend: spec.kind.name().to_string(),
            source,
        })?;

        let backend = spec.kind.name();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, backend, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, backend, true));
        }

        tracing::info!(
            backend,
            pid = ?child.id(),
            program = %spec.program,
            "Launched backend process"
        );

        Ok(Self {
            kind: spec.kind,
            child,
            started_at: Utc::now(),
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            backend: self.kind.name(),
            pid: self.child.id(),
            started_at: self.started_at,
        }
    }

    /// Whether the child has not exited yet
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the child and wait up to `grace` for it to exit
    pub async fn stop(mut self, grace: Duration) {
        let backend = self.kind.name();
        if let Err(e) = self.child.start_kill() {
            // Already exited
            tracing::debug!(backend, "Kill not delivered: {}", e);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => tracing::info!(backend, %status, "Backend process stopped"),
            Ok(Err(e)) => tracing::warn!(backend, "Failed waiting for backend process: {}", e),
            Err(_) => tracing::warn!(
                backend,
                grace_secs = grace.as_secs(),
                "Backend process did not exit in time"
            ),
        }
    }
}

async fn forward_lines<R>(reader: R, backend: &'static str, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => tracing::warn!(backend, "{}", line),
            Ok(Some(line)) => tracing::info!(backend, "{}", line),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(backend, "Stopped reading child output: {}", e);
                break;
            }
        }
    }
}
