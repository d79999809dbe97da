//! Configuration management for the parse gateway

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::backends::BackendKind;

pub const TIKA_JAR_URL: &str =
    "https://archive.apache.org/dist/tika/2.9.1/tika-server-standard-2.9.1.jar";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub backends: BackendsConfig,
    pub upload: UploadConfig,
    pub cache: CacheConfig,
    pub routing: RoutingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How long the startup health pass keeps polling a backend
    pub health_wait: Duration,
    /// Resident memory above which the cache is asked to shed expired entries
    pub memory_threshold_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct BackendsConfig {
    pub tika_url: String,
    pub pymupdf_url: String,
    pub unstructured_url: String,
    /// Backends launched and owned by this process (the rest are external)
    pub managed: Vec<BackendKind>,
    pub python_path: String,
    pub java_path: String,
    /// Directory holding the Python service scripts
    pub backends_dir: PathBuf,
    pub tika_jar_path: PathBuf,
    pub tika_jar_url: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: PathBuf,
    pub max_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub large_threshold: u64,
    pub chunk_threshold: u64,
    pub chunking_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_parallel: usize,
    pub pages_per_chunk: u32,
    pub job_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                health_wait: Duration::from_secs(30),
                memory_threshold_bytes: 250 * MIB,
            },
            backends: BackendsConfig {
                tika_url: "http://localhost:9998".to_string(),
                pymupdf_url: "http://localhost:3001".to_string(),
                unstructured_url: "http://localhost:3002".to_string(),
                managed: Vec::new(),
                python_path: "python3".to_string(),
                java_path: "java".to_string(),
                backends_dir: PathBuf::from("./server"),
                tika_jar_path: PathBuf::from("./server/tika-server.jar"),
                tika_jar_url: TIKA_JAR_URL.to_string(),
                request_timeout: Duration::from_secs(300),
            },
            upload: UploadConfig {
                dir: PathBuf::from("./uploads"),
                max_bytes: 100 * MIB,
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(24 * 60 * 60),
                max_entries: 100,
            },
            routing: RoutingConfig {
                large_threshold: 10 * MIB,
                chunk_threshold: 20 * MIB,
                chunking_enabled: false,
            },
            pipeline: PipelineConfig {
                max_parallel: 8,
                pages_per_chunk: 25,
                job_timeout: Duration::from_secs(30 * 60),
            },
        }
    }
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let d = Config::default();

        Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(d.server.host),
                port: parse_var("PORT", d.server.port),
                health_wait: Duration::from_secs(parse_var(
                    "HEALTH_WAIT_SECS",
                    d.server.health_wait.as_secs(),
                )),
                memory_threshold_bytes: parse_var(
                    "MEMORY_THRESHOLD_MB",
                    d.server.memory_threshold_bytes / MIB,
                ) * MIB,
            },
            backends: BackendsConfig {
                tika_url: env::var("TIKA_URL").unwrap_or(d.backends.tika_url),
                pymupdf_url: env::var("PYMUPDF_URL").unwrap_or(d.backends.pymupdf_url),
                unstructured_url: env::var("UNSTRUCTURED_URL")
                    .unwrap_or(d.backends.unstructured_url),
                managed: env::var("MANAGED_BACKENDS")
                    .map(|v| parse_managed(&v))
                    .unwrap_or(d.backends.managed),
                python_path: env::var("PYTHON_PATH").unwrap_or(d.backends.python_path),
                java_path: env::var("JAVA_PATH").unwrap_or(d.backends.java_path),
                backends_dir: env::var("BACKENDS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(d.backends.backends_dir),
                tika_jar_path: env::var("TIKA_JAR_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(d.backends.tika_jar_path),
                tika_jar_url: env::var("TIKA_JAR_URL").unwrap_or(d.backends.tika_jar_url),
                request_timeout: Duration::from_secs(parse_var(
                    "BACKEND_TIMEOUT_SECS",
                    d.backends.request_timeout.as_secs(),
                )),
            },
            upload: UploadConfig {
                dir: env::var("UPLOAD_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(d.upload.dir),
                max_bytes: parse_var("MAX_UPLOAD_BYTES", d.upload.max_bytes),
            },
            cache: CacheConfig {
                ttl: Duration::from_secs(parse_var("CACHE_TTL_SECS", d.cache.ttl.as_secs())),
                max_entries: parse_var("CACHE_MAX_ENTRIES", d.cache.max_entries),
            },
            routing: RoutingConfig {
                large_threshold: parse_var("LARGE_FILE_THRESHOLD", d.routing.large_threshold),
                chunk_threshold: parse_var("CHUNK_THRESHOLD", d.routing.chunk_threshold),
                chunking_enabled: parse_var("CHUNKING_ENABLED", d.routing.chunking_enabled),
            },
            pipeline: PipelineConfig {
                max_parallel: parse_var("MAX_PARALLEL_JOBS", d.pipeline.max_parallel).max(1),
                pages_per_chunk: parse_var("PAGES_PER_CHUNK", d.pipeline.pages_per_chunk).max(1),
                job_timeout: Duration::from_secs(parse_var(
                    "JOB_TIMEOUT_SECS",
                    d.pipeline.job_timeout.as_secs(),
                )),
            },
        }
    }

    /// Base URL configured for a backend
    pub fn backend_url(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Tika => &self.backends.tika_url,
            BackendKind::PyMuPdf => &self.backends.pymupdf_url,
            BackendKind::Unstructured => &self.backends.unstructured_url,
        }
    }

    pub fn is_managed(&self, kind: BackendKind) -> bool {
        self.backends.managed.contains(&kind)
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
            default
        }),
        Err(_) => default,
    }
}

/// Parse a comma-separated list of backend selectors (`tika,pdf,extract`)
fn parse_managed(raw: &str) -> Vec<BackendKind> {
    let mut kinds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match BackendKind::from_selector(part) {
            Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
            Some(_) => {}
            None => tracing::warn!(selector = part, "Unknown backend in MANAGED_BACKENDS"),
        }
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upload.max_bytes, 100 * 1024 * 1024);
        assert_eq!(config.cache.max_entries, 100);
        assert_eq!(config.cache.ttl, Duration::from_secs(86_400));
        assert_eq!(config.pipeline.max_parallel, 8);
        assert!(config.backends.managed.is_empty());
    }

    #[test]
    fn test_parse_managed() {
        assert_eq!(
            parse_managed("tika, pdf ,extract,pdf"),
            vec![BackendKind::Tika, BackendKind::PyMuPdf, BackendKind::Unstructured]
        );
        assert_eq!(parse_managed("pymupdf,bogus"), vec![BackendKind::PyMuPdf]);
        assert!(parse_managed("").is_empty());
    }

    #[test]
    fn test_backend_url() {
        let config = Config::default();
        assert_eq!(config.backend_url(BackendKind::PyMuPdf), "http://localhost:3001");
        assert_eq!(config.backend_url(BackendKind::Tika), "http://localhost:9998");
    }
}
