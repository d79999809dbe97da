//! Backend adapter trait and shared HTTP plumbing

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use super::types::{BackendDescriptor, BackendError, BackendKind, SubmitOptions};

/// Upper bound for a single health probe, independent of the call timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Normalized call contract implemented once per backend
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Static description of the backend
    fn descriptor(&self) -> &BackendDescriptor;

    /// Send a file to the backend and return its structured payload.
    ///
    /// Performs exactly one HTTP call and never retries.
    async fn submit(
        &self,
        path: &Path,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Value, BackendError>;

    /// Lightweight reachability probe
    async fn health_check(&self) -> bool;

    /// Look up a job running inside the backend itself
    async fn job_status(&self, _process_id: &str) -> Result<Value, BackendError> {
        Err(BackendError::Unsupported {
            backend: self.descriptor().name.to_string(),
            operation: "job status",
        })
    }

    fn kind(&self) -> BackendKind {
        self.descriptor().kind
    }
}

/// HTTP client bound to a single backend
#[derive(Clone)]
pub(crate) struct HttpBackend {
    pub descriptor: BackendDescriptor,
    pub client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(descriptor: BackendDescriptor, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}, using defaults", e);
                reqwest::Client::new()
            });
        Self { descriptor, client }
    }

    fn fail(&self, message: impl Into<String>) -> BackendError {
        BackendError::call_failed(self.descriptor.kind, message)
    }

    /// Send a prepared request and decode a JSON body, mapping every
    /// failure to `CallFailed`.
    pub async fn send_json(&self, request: reqwest::RequestBuilder) -> Result<Value, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| self.fail(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.fail(format!("returned {}: {}", status, truncate(&body, 512))));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.fail(format!("failed to read response: {}", e)))?;

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        // Some endpoints answer with plain text; keep it rather than failing
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| {
            serde_json::json!({ "content": body })
        }))
    }

    /// Multipart form carrying the file as field `file`
    pub async fn file_form(
        &self,
        path: &Path,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Form, BackendError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let mime = mime_guess::from_path(filename).first_or_octet_stream();

        let part = Part::stream_with_length(reqwest::Body::from(file), len)
            .file_name(filename.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| self.fail(format!("invalid mime type {}: {}", mime, e)))?;

        let mut form = Form::new().part("file", part);
        if let Some(pages) = options.pages {
            form = form
                .text("startPage", pages.start.to_string())
                .text("endPage", pages.end.to_string());
        }
        Ok(form)
    }

    pub async fn probe(&self) -> bool {
        let url = self.descriptor.url(self.descriptor.health_path);
        match self.client.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(backend = self.descriptor.name, url = %url, "Health probe failed: {}", e);
                false
            }
        }
    }

    /// GET `/status/{id}` on the backend
    pub async fn status(&self, process_id: &str) -> Result<Value, BackendError> {
        let url = self
            .descriptor
            .url(&format!("/status/{}", urlencoding::encode(process_id)));
        self.send_json(self.client.get(url)).await
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééé", 3), "é");
    }
}
