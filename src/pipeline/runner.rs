//! Chunked job execution
//!
//! Dispatches every chunk to the backend with bounded concurrency, collects
//! completions tagged with their chunk index and merges them in index order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde_json::{json, Value};

use crate::backends::{BackendAdapter, BackendError, SubmitOptions};
use crate::parse::{ParseRequest, ParseResult, ParseStatus};

use super::chunks::Chunk;
use super::merge::merge_chunks;

/// Settings shared by all chunked jobs
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum chunks in flight per job
    pub max_parallel: usize,
    /// Upper bound on a whole job
    pub job_timeout: Duration,
}

/// Run every chunk against `adapter` and merge the results.
///
/// Never fails: errors and timeouts become a result with status `error`.
pub async fn run_chunked(
    adapter: Arc<dyn BackendAdapter>,
    request: &ParseRequest,
    chunks: Vec<Chunk>,
    settings: PipelineSettings,
    job_id: &str,
) -> ParseResult {
    let started = Instant::now();
    let parser = adapter.descriptor().name;
    let chunk_count = chunks.len();

    tracing::info!(
        job_id,
        backend = parser,
        file = %request.file_name,
        chunks = chunk_count,
        max_parallel = settings.max_parallel,
        "Starting chunked job"
    );

    let work = dispatch(adapter.clone(), request, chunks, settings.max_parallel);
    let outcome = match tokio::time::timeout(settings.job_timeout, work).await {
        Ok(outcome) => outcome,
        Err(_) => Err(BackendError::call_failed(
            adapter.kind(),
            format!("job timed out after {}s", settings.job_timeout.as_secs()),
        )),
    };

    let elapsed = started.elapsed().as_millis() as u64;
    let result = match outcome {
        Ok(parts) => {
            tracing::info!(job_id, chunks = chunk_count, elapsed_ms = elapsed, "Chunked job complete");
            ParseResult::for_request(request, ParseStatus::Success, parser, merge_chunks(parts))
        }
        Err(e) => {
            tracing::error!(job_id, backend = parser, "Chunked job failed: {}", e);
            ParseResult::for_request(
                request,
                ParseStatus::Error,
                parser,
                json!({ "error": e.to_string() }),
            )
        }
    };

    result.with_processing_time(elapsed).with_job_id(job_id)
}

async fn dispatch(
    adapter: Arc<dyn BackendAdapter>,
    request: &ParseRequest,
    chunks: Vec<Chunk>,
    max_parallel: usize,
) -> Result<Vec<(Chunk, Value)>, BackendError> {
    let submissions = chunks.into_iter().map(|chunk| {
        let adapter = adapter.clone();
        async move {
            let options = SubmitOptions {
                extract_content: true,
                pages: Some(chunk.pages),
            };
            let value = adapter
                .submit(&request.path, &request.file_name, &options)
                .await?;
            tracing::debug!(index = chunk.index, pages = ?chunk.pages, "Chunk complete");
            Ok::<_, BackendError>((chunk, value))
        }
    });

    let mut in_flight = stream::iter(submissions).buffer_unordered(max_parallel.max(1));
    let mut parts = Vec::new();
    while let Some(part) = in_flight.next().await {
        // First failure ends the job; dropping the stream cancels the rest
        parts.push(part?);
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::FakeAdapter;
    use crate::backends::BackendKind;
    use crate::pipeline::chunks::plan_chunks;
    use crate::routing::{FileType, RouteHints};
    use std::path::PathBuf;

    fn request() -> ParseRequest {
        ParseRequest {
            path: PathBuf::from("/nonexistent/staged.pdf"),
            file_name: "big.pdf".into(),
            file_type: FileType::Pdf,
            file_size: 50 * 1024 * 1024,
            modified_ms: None,
            hints: RouteHints::default(),
        }
    }

    fn settings(max_parallel: usize) -> PipelineSettings {
        PipelineSettings {
            max_parallel,
            job_timeout: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn test_chunks_merged_in_index_order() {
        let adapter = Arc::new(
            FakeAdapter::new(BackendKind::PyMuPdf).with_reverse_delay(Duration::from_millis(1)),
        );
        let chunks = plan_chunks(100, 25);

        let result = run_chunked(adapter.clone(), &request(), chunks, settings(8), "job_x").await;

        assert_eq!(result.status, ParseStatus::Success);
        assert_eq!(result.parser, "pymupdf");
        assert_eq!(result.job_id.as_deref(), Some("job_x"));
        assert_eq!(result.data["content"], "[1-25][26-50][51-75][76-100]");
        assert_eq!(result.data["chunkCount"], 4);
        assert_eq!(adapter.calls(), 4);
    }

    #[tokio::test]
    async fn test_serial_dispatch_gives_same_result() {
        let adapter = Arc::new(FakeAdapter::new(BackendKind::PyMuPdf));
        let result = run_chunked(adapter, &request(), plan_chunks(60, 25), settings(1), "job_y").await;
        assert_eq!(result.data["content"], "[1-25][26-50][51-60]");
    }

    #[tokio::test]
    async fn test_chunk_failure_marks_job_error() {
        let adapter = Arc::new(FakeAdapter::new(BackendKind::PyMuPdf).failing());
        let result = run_chunked(adapter, &request(), plan_chunks(50, 25), settings(4), "job_z").await;

        assert_eq!(result.status, ParseStatus::Error);
        assert!(result.data["error"].as_str().unwrap().contains("pymupdf"));
    }

    #[tokio::test]
    async fn test_job_timeout_marks_job_error() {
        let adapter = Arc::new(
            FakeAdapter::new(BackendKind::PyMuPdf).with_reverse_delay(Duration::from_secs(1)),
        );
        let settings = PipelineSettings {
            max_parallel: 2,
            job_timeout: Duration::from_millis(20),
        };
        let result = run_chunked(adapter, &request(), plan_chunks(10, 5), settings, "job_t").await;

        assert_eq!(result.status, ParseStatus::Error);
        assert!(result.data["error"].as_str().unwrap().contains("timed out"));
    }
}
