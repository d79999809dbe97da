//! Adapters for the Python extraction services
//!
//! PyMuPDF (`POST /parse-pdf`) and Unstructured (`POST /extract`) share the
//! same wire shape: a multipart upload with the document in field `file`, and
//! a `GET /status/{processId}` endpoint for work they finish in the background.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::adapter::{BackendAdapter, HttpBackend};
use super::types::{BackendDescriptor, BackendError, BackendKind, SubmitOptions};

pub struct MultipartAdapter {
    http: HttpBackend,
    endpoint: &'static str,
}

impl MultipartAdapter {
    /// Adapter for the PyMuPDF service
    pub fn pymupdf(base_url: impl Into<String>, managed: bool, timeout: Duration) -> Self {
        Self::new(
            BackendDescriptor::new(BackendKind::PyMuPdf, base_url, managed),
            timeout,
        )
    }

    /// Adapter for the Unstructured service
    pub fn unstructured(base_url: impl Into<String>, managed: bool, timeout: Duration) -> Self {
        Self::new(
            BackendDescriptor::new(BackendKind::Unstructured, base_url, managed),
            timeout,
        )
    }

    pub fn new(descriptor: BackendDescriptor, timeout: Duration) -> Self {
        let endpoint = match descriptor.kind {
            BackendKind::PyMuPdf => "/parse-pdf",
            _ => "/extract",
        };
        Self {
            http: HttpBackend::new(descriptor, timeout),
            endpoint,
        }
    }
}

#[async_trait]
impl BackendAdapter for MultipartAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.http.descriptor
    }

    async fn submit(
        &self,
        path: &Path,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Value, BackendError> {
        let form = self.http.file_form(path, filename, options).await?;

        tracing::debug!(
            backend = self.http.descriptor.name,
            file = filename,
            pages = ?options.pages,
            "Submitting multipart upload"
        );

        let request = self
            .http
            .client
            .post(self.http.descriptor.url(self.endpoint))
            .multipart(form);

        self.http.send_json(request).await
    }

    async fn health_check(&self) -> bool {
        self.http.probe().await
    }

    async fn job_status(&self, process_id: &str) -> Result<Value, BackendError> {
        self.http.status(process_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Multipart, Path as AxumPath},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::io::Write;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo_upload(mut multipart: Multipart) -> Json<Value> {
        let mut file_name = None;
        let mut size = 0usize;
        let mut start_page = None;
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    file_name = field.file_name().map(|s| s.to_string());
                    size = field.bytes().await.unwrap().len();
                }
                "startPage" => start_page = Some(field.text().await.unwrap()),
                _ => {}
            }
        }
        Json(serde_json::json!({
            "fileName": file_name,
            "size": size,
            "startPage": start_page,
        }))
    }

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_submit_sends_file_and_page_range() {
        let url = spawn(Router::new().route("/parse-pdf", post(echo_upload))).await;
        let adapter = MultipartAdapter::pymupdf(url, false, Duration::from_secs(5));
        let file = temp_file(b"%PDF-1.7 test");

        let options = SubmitOptions {
            extract_content: true,
            pages: Some(crate::backends::PageRange { start: 26, end: 50 }),
        };
        let value = adapter
            .submit(file.path(), "report.pdf", &options)
            .await
            .unwrap();

        assert_eq!(value["fileName"], "report.pdf");
        assert_eq!(value["size"], 13);
        assert_eq!(value["startPage"], "26");
    }

    #[tokio::test]
    async fn test_non_success_is_call_failed_with_backend_name() {
        let router = Router::new().route(
            "/extract",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let url = spawn(router).await;
        let adapter = MultipartAdapter::unstructured(url, false, Duration::from_secs(5));
        let file = temp_file(b"hello");

        let err = adapter
            .submit(file.path(), "notes.txt", &SubmitOptions::default())
            .await
            .unwrap_err();

        match err {
            BackendError::CallFailed { backend, message } => {
                assert_eq!(backend, "unstructured");
                assert!(message.contains("502"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_health_and_submit() {
        // Port 9 (discard) is never served in the test environment
        let adapter =
            MultipartAdapter::pymupdf("http://127.0.0.1:9", false, Duration::from_secs(2));
        assert!(!adapter.health_check().await);

        let file = temp_file(b"%PDF");
        let err = adapter
            .submit(file.path(), "a.pdf", &SubmitOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::CallFailed { .. }));
    }

    #[tokio::test]
    async fn test_health_and_status_passthrough() {
        let router = Router::new()
            .route("/", get(|| async { Json(serde_json::json!({"status": "healthy"})) }))
            .route(
                "/status/:id",
                get(|AxumPath(id): AxumPath<String>| async move {
                    Json(serde_json::json!({"processId": id, "status": "completed"}))
                }),
            );
        let url = spawn(router).await;
        let adapter = MultipartAdapter::unstructured(url, false, Duration::from_secs(5));

        assert!(adapter.health_check().await);
        let status = adapter.job_status("doc_1700000000").await.unwrap();
        assert_eq!(status["processId"], "doc_1700000000");
        assert_eq!(status["status"], "completed");
    }
}
