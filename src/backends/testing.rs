//! In-process fake backend for tests

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::adapter::BackendAdapter;
use super::types::{BackendDescriptor, BackendError, BackendKind, SubmitOptions};

pub struct FakeAdapter {
    descriptor: BackendDescriptor,
    healthy: bool,
    failing: bool,
    /// Delay later page ranges less so chunks finish out of order
    reverse_delay: Option<Duration>,
    health_delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            descriptor: BackendDescriptor::new(kind, "http://fake.invalid", false),
            healthy: true,
            failing: false,
            reverse_delay: None,
            health_delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_reverse_delay(mut self, step: Duration) -> Self {
        self.reverse_delay = Some(step);
        self
    }

    /// Health checks hang for `delay` before answering
    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendAdapter for FakeAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.descriptor
    }

    async fn submit(
        &self,
        _path: &Path,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Value, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing {
            return Err(BackendError::call_failed(self.descriptor.kind, "fake failure"));
        }

        match options.pages {
            Some(pages) => {
                if let Some(step) = self.reverse_delay {
                    let rank = 1000u32.saturating_sub(pages.start);
                    tokio::time::sleep(step * rank / 100).await;
                }
                Ok(json!({ "content": format!("[{}-{}]", pages.start, pages.end) }))
            }
            None => Ok(json!({
                "content": format!("{} parsed {}", self.descriptor.name, filename),
                "fullContent": options.extract_content,
            })),
        }
    }

    async fn health_check(&self) -> bool {
        if let Some(delay) = self.health_delay {
            tokio::time::sleep(delay).await;
        }
        self.healthy
    }

    async fn job_status(&self, process_id: &str) -> Result<Value, BackendError> {
        Ok(json!({ "processId": process_id, "status": "completed", "progress": 100 }))
    }
}
