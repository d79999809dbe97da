//! Apache Tika server adapter
//!
//! Tika takes the raw document as a `PUT` body. `/rmeta/text` returns a JSON
//! array with metadata and extracted text per embedded document, `/meta`
//! returns metadata only.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;

use super::adapter::{BackendAdapter, HttpBackend};
use super::types::{BackendDescriptor, BackendError, SubmitOptions};

const CONTENT_ENDPOINT: &str = "/rmeta/text";
const METADATA_ENDPOINT: &str = "/meta";

pub struct TikaAdapter {
    http: HttpBackend,
}

impl TikaAdapter {
    pub fn new(descriptor: BackendDescriptor, timeout: Duration) -> Self {
        Self {
            http: HttpBackend::new(descriptor, timeout),
        }
    }
}

#[async_trait]
impl BackendAdapter for TikaAdapter {
    fn descriptor(&self) -> &BackendDescriptor {
        &self.http.descriptor
    }

    async fn submit(
        &self,
        path: &Path,
        filename: &str,
        options: &SubmitOptions,
    ) -> Result<Value, BackendError> {
        let endpoint = if options.extract_content {
            CONTENT_ENDPOINT
        } else {
            METADATA_ENDPOINT
        };

        let file = tokio::fs::File::open(path).await?;
        let mime = mime_guess::from_path(filename).first_or_octet_stream();

        tracing::debug!(file = filename, endpoint, "Submitting to Tika");

        let request = self
            .http
            .client
            .put(self.http.descriptor.url(endpoint))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, mime.as_ref())
            .header("X-Tika-Filename", urlencoding::encode(filename).into_owned())
            .body(reqwest::Body::from(file));

        self.http.send_json(request).await
    }

    async fn health_check(&self) -> bool {
        self.http.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendKind;
    use axum::{
        body::Bytes,
        http::{HeaderMap, StatusCode},
        routing::{get, put},
        Json, Router,
    };
    use std::io::Write;

    fn full_content() -> SubmitOptions {
        SubmitOptions {
            extract_content: true,
            pages: None,
        }
    }

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn echo(endpoint: &'static str, headers: HeaderMap, body: Bytes) -> Json<Value> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(serde_json::json!({
            "endpoint": endpoint,
            "accept": header("accept"),
            "contentType": header("content-type"),
            "filename": header("x-tika-filename"),
            "size": body.len(),
        }))
    }

    fn fake_tika() -> Router {
        Router::new()
            .route("/rmeta/text", put(|h: HeaderMap, b: Bytes| echo("rmeta", h, b)))
            .route("/meta", put(|h: HeaderMap, b: Bytes| echo("meta", h, b)))
            .route("/version", get(|| async { "Apache Tika 2.9.1" }))
    }

    fn adapter(url: String) -> TikaAdapter {
        TikaAdapter::new(
            BackendDescriptor::new(BackendKind::Tika, url, false),
            Duration::from_secs(5),
        )
    }

    fn temp_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_full_content_uses_rmeta() {
        let tika = adapter(spawn(fake_tika()).await);
        let file = temp_file(b"%PDF-1.7 body");

        let value = tika
            .submit(file.path(), "My Report.pdf", &full_content())
            .await
            .unwrap();

        assert_eq!(value["endpoint"], "rmeta");
        assert_eq!(value["accept"], "application/json");
        assert_eq!(value["contentType"], "application/pdf");
        assert_eq!(value["filename"], "My%20Report.pdf");
        assert_eq!(value["size"], 13);
    }

    #[tokio::test]
    async fn test_metadata_only_uses_meta() {
        let tika = adapter(spawn(fake_tika()).await);
        let file = temp_file(b"PK");

        let value = tika
            .submit(file.path(), "deck.pptx", &SubmitOptions::default())
            .await
            .unwrap();
        assert_eq!(value["endpoint"], "meta");
    }

    #[tokio::test]
    async fn test_error_status_and_health() {
        let url = spawn(Router::new().route(
            "/rmeta/text",
            put(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "encrypted document") }),
        ))
        .await;
        let tika = adapter(url);
        let file = temp_file(b"x");

        let err = tika
            .submit(file.path(), "locked.pdf", &full_content())
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("tika"));
        assert!(message.contains("422"));

        // No /version route on this server
        assert!(!tika.health_check().await);
        assert!(adapter(spawn(fake_tika()).await).health_check().await);
    }

    #[tokio::test]
    async fn test_job_status_is_unsupported() {
        let tika = adapter("http://127.0.0.1:9".into());
        assert!(matches!(
            tika.job_status("x").await,
            Err(BackendError::Unsupported { .. })
        ));
    }
}
