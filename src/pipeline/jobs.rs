//! Background job registry
//!
//! Every chunked job runs as its own tokio task. The registry keeps the abort
//! handle of each running job so it can be cancelled individually or all at
//! once on shutdown. Finished jobs remove themselves.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::AbortHandle;

/// Prefix of every gateway job id
const JOB_ID_PREFIX: &str = "job_";

#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a fresh job identifier
    pub fn next_id() -> String {
        format!("{}{}", JOB_ID_PREFIX, uuid::Uuid::new_v4().simple())
    }

    /// Whether `id` has the shape of a gateway job id
    pub fn is_job_id(id: &str) -> bool {
        id.starts_with(JOB_ID_PREFIX)
    }

    /// Spawn `job` in the background under `job_id`
    pub fn spawn<F>(&self, job_id: String, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let registry = self.clone();
        let id = job_id.clone();

        // Hold the lock across spawn + insert so a job that finishes
        // immediately cannot try to deregister before it is registered
        let mut jobs = self.inner.lock();
        let handle = tokio::spawn(async move {
            job.await;
            registry.inner.lock().remove(&id);
        });
        jobs.insert(job_id, handle.abort_handle());
    }

    /// Abort a running job. Returns false if it was not running.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.inner.lock().remove(job_id) {
            Some(handle) => {
                handle.abort();
                tracing::info!(job_id, "Cancelled background job");
                true
            }
            None => false,
        }
    }

    /// Abort every running job
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<(String, AbortHandle)> = self.inner.lock().drain().collect();
        for (job_id, handle) in &drained {
            handle.abort();
            tracing::info!(job_id = %job_id, "Cancelled background job");
        }
        drained.len()
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.inner.lock().contains_key(job_id)
    }

    pub fn active(&self) -> usize {
        self.inner.lock().len()
    }
}
