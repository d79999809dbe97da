//! Parse Service
//!
//! Orchestrates a parse request: cache lookup, routing, the direct adapter
//! call or the background chunk job, and storing the result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};

use crate::backends::{BackendAdapter, BackendKind, BackendRegistry, SubmitOptions};
use crate::cache::{Fingerprint, ResultCache};
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::memory;
use crate::pipeline::{
    estimate_pages, plan_chunks, run_chunked, JobRegistry, PipelineSettings,
};
use crate::routing::{decide, RouteTarget, RoutingPolicy, Strategy};

use super::types::{ParseRequest, ParseResult, ParseStatus};

/// Parser name reported for formats the reader renders itself
pub const CLIENT_PARSER: &str = "client";

/// Parse service settings
#[derive(Debug, Clone)]
pub struct ParseServiceConfig {
    pub policy: RoutingPolicy,
    pub pipeline: PipelineSettings,
    /// Default pages per chunk when the request carries no `chunkSize`
    pub pages_per_chunk: u32,
    pub memory_threshold_bytes: u64,
}

impl From<&Config> for ParseServiceConfig {
    fn from(config: &Config) -> Self {
        Self {
            policy: RoutingPolicy::from(&config.routing),
            pipeline: PipelineSettings {
                max_parallel: config.pipeline.max_parallel,
                job_timeout: config.pipeline.job_timeout,
            },
            pages_per_chunk: config.pipeline.pages_per_chunk,
            memory_threshold_bytes: config.server.memory_threshold_bytes,
        }
    }
}

impl Default for ParseServiceConfig {
    fn default() -> Self {
        (&Config::default()).into()
    }
}

/// Gateway core shared by the HTTP handlers
#[derive(Clone)]
pub struct ParseService {
    config: Arc<ParseServiceConfig>,
    cache: Arc<dyn ResultCache>,
    backends: BackendRegistry,
    jobs: JobRegistry,
}

impl ParseService {
    pub fn new(
        config: ParseServiceConfig,
        cache: Arc<dyn ResultCache>,
        backends: BackendRegistry,
        jobs: JobRegistry,
    ) -> Self {
        Self {
            config: Arc::new(config),
            cache,
            backends,
            jobs,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Smart-routed parse.
    ///
    /// Consumes the staged upload: the file is removed once the response (or
    /// the background job) no longer needs it.
    pub async fn parse(&self, request: ParseRequest) -> Result<ParseResult> {
        let started = Instant::now();

        let fingerprint = match Fingerprint::for_upload(
            &request.path,
            &request.file_name,
            request.file_size,
            request.modified_ms,
        )
        .await
        {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                discard_staged(&request.path).await;
                return Err(e.into());
            }
        };

        if let Some(hit) = self.cache.get(&fingerprint) {
            tracing::info!(file = %request.file_name, key = %fingerprint, "Cache hit");
            discard_staged(&request.path).await;
            return Ok(hit.as_cached());
        }

        let decision = decide(
            request.file_type,
            request.file_size,
            &request.hints,
            &self.config.policy,
        );
        tracing::debug!(
            file = %request.file_name,
            file_type = %request.file_type,
            size = request.file_size,
            ?decision,
            "Routed parse request"
        );

        let kind = match decision.target {
            RouteTarget::ClientSide => {
                discard_staged(&request.path).await;
                let data = json!({
                    "message": format!("{} files are rendered by the reader", request.file_type),
                });
                return Ok(ParseResult::for_request(
                    &request,
                    ParseStatus::ClientProcessing,
                    CLIENT_PARSER,
                    data,
                )
                .with_processing_time(elapsed_ms(started)));
            }
            RouteTarget::Backend(kind) => kind,
        };

        let adapter = match self.adapter(kind) {
            Ok(adapter) => adapter,
            Err(e) => {
                discard_staged(&request.path).await;
                return Err(e);
            }
        };

        if decision.strategy == Strategy::Chunked && kind == BackendKind::PyMuPdf {
            return Ok(self.start_chunked_job(adapter, request, fingerprint));
        }

        let options = SubmitOptions {
            extract_content: decision.extract_content,
            pages: None,
        };
        let result = self.call_direct(adapter.as_ref(), &request, &options, started).await;
        discard_staged(&request.path).await;
        let result = result?;

        self.cache.put(fingerprint, result.clone());
        self.relieve_memory_pressure();
        Ok(result)
    }

    /// Parse with a specific backend, skipping routing and the cache.
    ///
    /// Tika extracts full content unless `lowQualityPreview` was set.
    pub async fn parse_with(&self, kind: BackendKind, request: ParseRequest) -> Result<ParseResult> {
        let started = Instant::now();
        let options = SubmitOptions {
            extract_content: !request.hints.low_quality_preview,
            pages: None,
        };

        let result = match self.adapter(kind) {
            Ok(adapter) => {
                self.call_direct(adapter.as_ref(), &request, &options, started)
                    .await
            }
            Err(e) => Err(e),
        };
        discard_staged(&request.path).await;

        let result = result?;
        self.relieve_memory_pressure();
        Ok(result)
    }

    /// Stored result of a gateway job (processing or terminal)
    pub fn job(&self, job_id: &str) -> Option<ParseResult> {
        self.cache.get(&Fingerprint::from_key(job_id))
    }

    /// Status lookup: gateway job first, then the selected backend.
    ///
    /// Only gateway job ids are looked up locally; other cache keys are never
    /// exposed through this route.
    pub async fn status(&self, process_id: &str, service: Option<BackendKind>) -> Result<Value> {
        if JobRegistry::is_job_id(process_id) {
            if let Some(job) = self.job(process_id) {
                return serde_json::to_value(job).map_err(|e| AppError::Unexpected(e.to_string()));
            }
        }

        let Some(kind) = service else {
            return Err(AppError::NotFound(format!("No job with id {}", process_id)));
        };

        let adapter = self.adapter(kind)?;
        Ok(adapter.job_status(process_id).await?)
    }

    fn adapter(&self, kind: BackendKind) -> Result<Arc<dyn BackendAdapter>> {
        self.backends
            .get(kind)
            .ok_or_else(|| AppError::BackendUnavailable {
                backend: kind.name().to_string(),
                message: "backend is not registered".to_string(),
            })
    }

    async fn call_direct(
        &self,
        adapter: &dyn BackendAdapter,
        request: &ParseRequest,
        options: &SubmitOptions,
        started: Instant,
    ) -> Result<ParseResult> {
        let parser = adapter.descriptor().name;
        let data = adapter
            .submit(&request.path, &request.file_name, options)
            .await?;

        let elapsed = elapsed_ms(started);
        tracing::info!(
            file = %request.file_name,
            backend = parser,
            elapsed_ms = elapsed,
            "Parsed file"
        );

        Ok(ParseResult::for_request(request, ParseStatus::Success, parser, data)
            .with_processing_time(elapsed))
    }

    /// Register a `processing` entry and spawn the background job.
    fn start_chunked_job(
        &self,
        adapter: Arc<dyn BackendAdapter>,
        request: ParseRequest,
        fingerprint: Fingerprint,
    ) -> ParseResult {
        let job_id = JobRegistry::next_id();
        let estimated_pages = estimate_pages(request.file_size);
        let pages_per_chunk = request
            .hints
            .chunk_size
            .unwrap_or(self.config.pages_per_chunk)
            .max(1);
        let chunks = plan_chunks(estimated_pages, pages_per_chunk);

        let data = json!({
            "jobId": job_id,
            "estimatedPages": estimated_pages,
            "chunkCount": chunks.len(),
        });
        let pending = ParseResult::for_request(
            &request,
            ParseStatus::Processing,
            adapter.descriptor().name,
            data,
        )
        .with_job_id(&job_id);
        self.cache.put(Fingerprint::from_key(&job_id), pending.clone());

        let mut cancelled = pending.clone();
        cancelled.status = ParseStatus::Error;
        cancelled.data = json!({ "error": "job cancelled" });
        let cleanup = JobCleanup {
            cache: self.cache.clone(),
            staged: request.path.clone(),
            cancelled: Some((job_id.clone(), cancelled)),
        };

        let service = self.clone();
        let settings = self.config.pipeline;
        let id = job_id.clone();
        self.jobs.spawn(job_id, async move {
            let result = run_chunked(adapter, &request, chunks, settings, &id).await;

            if result.status == ParseStatus::Success {
                service.cache.put(fingerprint, result.clone());
            }
            service.cache.put(Fingerprint::from_key(&id), result);

            cleanup.finish();
            service.relieve_memory_pressure();
        });

        pending
    }

    fn relieve_memory_pressure(&self) {
        memory::relieve_pressure(self.cache.as_ref(), self.config.memory_threshold_bytes);
    }
}

/// Removes a chunked job's staged upload when the job task goes away.
///
/// If the task is dropped before `finish` (cancel or runtime shutdown), the
/// job id is also settled with an error result instead of staying
/// `processing`.
struct JobCleanup {
    cache: Arc<dyn ResultCache>,
    staged: PathBuf,
    cancelled: Option<(String, ParseResult)>,
}

impl JobCleanup {
    fn finish(mut self) {
        self.cancelled = None;
    }
}

impl Drop for JobCleanup {
    fn drop(&mut self) {
        if let Some((job_id, result)) = self.cancelled.take() {
            tracing::warn!(job_id = %job_id, "Chunked job cancelled before completion");
            self.cache.put(Fingerprint::from_key(&job_id), result);
        }

        // Drop cannot await
        match std::fs::remove_file(&self.staged) {
            Ok(()) => tracing::debug!(path = %self.staged.display(), "Removed staged upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.staged.display(),
                "Failed to remove staged upload: {}",
                e
            ),
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Remove a staged upload, tolerating files that are already gone
pub async fn discard_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed staged upload"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "Failed to remove staged upload: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::testing::FakeAdapter;
    use crate::cache::MemoryCache;
    use crate::routing::{FileType, RouteHints};
    use std::path::PathBuf;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    struct Harness {
        service: ParseService,
        tika: Arc<FakeAdapter>,
        pymupdf: Arc<FakeAdapter>,
        unstructured: Arc<FakeAdapter>,
        dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        harness_with(FakeAdapter::new(BackendKind::PyMuPdf))
    }

    fn harness_with(pymupdf: FakeAdapter) -> Harness {
        let tika = Arc::new(FakeAdapter::new(BackendKind::Tika));
        let pymupdf = Arc::new(pymupdf);
        let unstructured = Arc::new(FakeAdapter::new(BackendKind::Unstructured));
        let backends = BackendRegistry::new()
            .with(tika.clone())
            .with(pymupdf.clone())
            .with(unstructured.clone());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600), 100));

        Harness {
            service: ParseService::new(
                ParseServiceConfig::default(),
                cache,
                backends,
                JobRegistry::new(),
            ),
            tika,
            pymupdf,
            unstructured,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    impl Harness {
        fn stage(&self, file_name: &str, size: u64, hints: RouteHints) -> ParseRequest {
            let path: PathBuf = self.dir.path().join(uuid::Uuid::new_v4().to_string());
            std::fs::write(&path, b"%PDF-1.7").unwrap();
            ParseRequest {
                path,
                file_name: file_name.to_string(),
                file_type: FileType::detect(file_name),
                file_size: size,
                modified_ms: Some(1_700_000_000_000),
                hints,
            }
        }

        fn backend_calls(&self) -> usize {
            self.tika.calls() + self.pymupdf.calls() + self.unstructured.calls()
        }
    }

    #[tokio::test]
    async fn test_second_identical_upload_is_served_from_cache() {
        let h = harness();

        let first = h
            .service
            .parse(h.stage("report.pdf", 2 * MIB, RouteHints::default()))
            .await
            .unwrap();
        assert_eq!(first.status, ParseStatus::Success);
        assert_eq!(first.parser, "tika");
        assert_eq!(first.cached, None);
        assert_eq!(h.tika.calls(), 1);

        let second = h
            .service
            .parse(h.stage("report.pdf", 2 * MIB, RouteHints::default()))
            .await
            .unwrap();
        assert_eq!(second.cached, Some(true));
        assert_eq!(second.data, first.data);
        assert_eq!(h.backend_calls(), 1);
    }

    #[tokio::test]
    async fn test_epub_is_left_to_the_client() {
        let h = harness();
        let request = h.stage("book.epub", 3 * MIB, RouteHints::default());
        let staged = request.path.clone();

        let result = h.service.parse(request).await.unwrap();

        assert_eq!(result.status, ParseStatus::ClientProcessing);
        assert_eq!(result.parser, CLIENT_PARSER);
        assert_eq!(result.detected_type, FileType::Epub);
        assert_eq!(h.backend_calls(), 0);
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_direct_parse_removes_staged_file() {
        let h = harness();
        let request = h.stage("notes.md", 1024, RouteHints::default());
        let staged = request.path.clone();

        let result = h.service.parse(request).await.unwrap();

        assert_eq!(result.parser, "unstructured");
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_low_quality_preview_requests_metadata_only() {
        let h = harness();
        let hints = RouteHints {
            low_quality_preview: true,
            ..Default::default()
        };
        let result = h.service.parse(h.stage("deck.pptx", 1024, hints)).await.unwrap();
        assert_eq!(result.parser, "tika");
        assert_eq!(result.data["fullContent"], false);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_cached() {
        let tika = Arc::new(FakeAdapter::new(BackendKind::Tika).failing());
        let cache = Arc::new(MemoryCache::new(Duration::from_secs(3600), 100));
        let service = ParseService::new(
            ParseServiceConfig::default(),
            cache.clone(),
            BackendRegistry::new().with(tika),
            JobRegistry::new(),
        );
        let request = ParseRequest {
            path: PathBuf::from("/nonexistent/upload.docx"),
            file_name: "letter.docx".into(),
            file_type: FileType::Word,
            file_size: 10,
            modified_ms: Some(1),
            hints: RouteHints::default(),
        };

        let err = service.parse(request).await.unwrap_err();
        assert!(matches!(err, AppError::BackendCallFailed { ref backend, .. } if backend == "tika"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_chunked_job_completes_with_merged_content() {
        let h = harness();
        let hints = RouteHints {
            strategy: Some(Strategy::Chunked),
            chunk_size: Some(100),
            ..Default::default()
        };
        // 30 MiB estimates to 308 pages
        let request = h.stage("atlas.pdf", 30 * MIB, hints);
        let staged = request.path.clone();

        let pending = h.service.parse(request).await.unwrap();
        assert_eq!(pending.status, ParseStatus::Processing);
        assert_eq!(pending.parser, "pymupdf");
        let job_id = pending.job_id.clone().unwrap();
        assert!(job_id.starts_with("job_"));
        assert_eq!(pending.data["estimatedPages"], 308);
        assert_eq!(pending.data["chunkCount"], 4);

        let mut done = None;
        for _ in 0..200 {
            let job = h.service.job(&job_id).unwrap();
            if job.status.is_terminal() {
                done = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let done = done.expect("job did not finish");

        assert_eq!(done.status, ParseStatus::Success);
        assert_eq!(done.data["content"], "[1-100][101-200][201-300][301-308]");
        assert_eq!(h.pymupdf.calls(), 4);
        assert!(!staged.exists());

        // The merged result is also reachable by fingerprint
        let again = h
            .service
            .parse(h.stage("atlas.pdf", 30 * MIB, RouteHints::default()))
            .await
            .unwrap();
        assert_eq!(again.cached, Some(true));
        assert_eq!(h.pymupdf.calls(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_job_reports_error_and_removes_upload() {
        // Each chunk takes seconds, so the job is still running when cancelled
        let h = harness_with(
            FakeAdapter::new(BackendKind::PyMuPdf).with_reverse_delay(Duration::from_secs(1)),
        );
        let hints = RouteHints {
            strategy: Some(Strategy::Chunked),
            chunk_size: Some(100),
            ..Default::default()
        };
        let request = h.stage("atlas.pdf", 30 * MIB, hints);
        let staged = request.path.clone();

        let pending = h.service.parse(request).await.unwrap();
        let job_id = pending.job_id.clone().unwrap();
        assert!(h.service.jobs().is_running(&job_id));

        assert_eq!(h.service.jobs().cancel_all(), 1);

        let mut settled = None;
        for _ in 0..200 {
            let job = h.service.job(&job_id).unwrap();
            if job.status.is_terminal() {
                settled = Some(job);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let settled = settled.expect("cancelled job kept reporting processing");

        assert_eq!(settled.status, ParseStatus::Error);
        assert_eq!(settled.data["error"], "job cancelled");
        assert_eq!(settled.job_id.as_deref(), Some(job_id.as_str()));
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn test_forced_backend_skips_routing() {
        let h = harness();
        let result = h
            .service
            .parse_with(BackendKind::Unstructured, h.stage("paper.pdf", 1024, RouteHints::default()))
            .await
            .unwrap();
        assert_eq!(result.parser, "unstructured");
        assert_eq!(h.tika.calls(), 0);
    }

    #[tokio::test]
    async fn test_status_lookup() {
        let h = harness();

        let err = h.service.status("pdf_123", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let proxied = h
            .service
            .status("pdf_123", Some(BackendKind::PyMuPdf))
            .await
            .unwrap();
        assert_eq!(proxied["processId"], "pdf_123");
    }

    #[tokio::test]
    async fn test_status_does_not_expose_cached_parses() {
        let h = harness();
        let request = h.stage("report.pdf", 2 * MIB, RouteHints::default());
        let fingerprint = Fingerprint::for_upload(
            &request.path,
            &request.file_name,
            request.file_size,
            request.modified_ms,
        )
        .await
        .unwrap();
        h.service.parse(request).await.unwrap();
        assert!(h.service.cache().get(&fingerprint).is_some());

        let err = h.service.status(fingerprint.as_str(), None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
