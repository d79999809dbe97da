//! Backend types
//!
//! Identity, descriptors and call options shared by all backend adapters.

use serde::{Deserialize, Serialize};

/// The parsing backends the gateway knows how to reach
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Apache Tika server (metadata and content extraction)
    Tika,
    /// PyMuPDF service (fast PDF extraction)
    #[serde(rename = "pymupdf")]
    PyMuPdf,
    /// Unstructured service (layout-aware extraction)
    Unstructured,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::Tika,
        BackendKind::PyMuPdf,
        BackendKind::Unstructured,
    ];

    /// Name reported in response envelopes and logs
    pub fn name(self) -> &'static str {
        match self {
            BackendKind::Tika => "tika",
            BackendKind::PyMuPdf => "pymupdf",
            BackendKind::Unstructured => "unstructured",
        }
    }

    /// Resolve a selector as used in routes, query strings and config.
    ///
    /// Accepts both the route aliases (`pdf`, `extract`) and backend names.
    pub fn from_selector(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "tika" => Some(BackendKind::Tika),
            "pdf" | "pymupdf" => Some(BackendKind::PyMuPdf),
            "extract" | "unstructured" => Some(BackendKind::Unstructured),
            _ => None,
        }
    }

    /// Path polled by the startup health pass
    pub fn health_path(self) -> &'static str {
        match self {
            BackendKind::Tika => "/version",
            BackendKind::PyMuPdf | BackendKind::Unstructured => "/",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a backend, built once at startup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub name: &'static str,
    pub base_url: String,
    pub health_path: &'static str,
    /// Whether the supervisor launches and owns this backend's process
    pub managed: bool,
}

impl BackendDescriptor {
    pub fn new(kind: BackendKind, base_url: impl Into<String>, managed: bool) -> Self {
        let base_url = base_url.into();
        Self {
            kind,
            name: kind.name(),
            base_url: base_url.trim_end_matches('/').to_string(),
            health_path: kind.health_path(),
            managed,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Inclusive, 1-based page range of a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

/// Per-call options passed to an adapter
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Full content extraction instead of metadata only (Tika)
    pub extract_content: bool,
    /// Restrict processing to a page range (chunked PDF jobs)
    pub pages: Option<PageRange>,
}

/// Backend adapter errors
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("{backend}: {message}")]
    CallFailed { backend: String, message: String },

    #[error("{backend} does not support {operation}")]
    Unsupported {
        backend: String,
        operation: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn call_failed(kind: BackendKind, message: impl Into<String>) -> Self {
        BackendError::CallFailed {
            backend: kind.name().to_string(),
            message: message.into(),
        }
    }
}
