//! Routing policy
//!
//! Maps (file type, size, client hints) to a backend and a processing
//! strategy. Pure: no I/O, no clock, no shared state.

use serde::{Deserialize, Serialize};

use crate::backends::BackendKind;
use crate::config::RoutingConfig;

use super::file_type::FileType;

/// How the chosen backend is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One synchronous adapter call
    #[default]
    Direct,
    /// Background job split into page-range chunks
    Chunked,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Some(Strategy::Direct),
            "chunked" | "chunk" => Some(Strategy::Chunked),
            _ => None,
        }
    }
}

/// Client-supplied routing hints
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteHints {
    pub priority_extraction: bool,
    pub strategy: Option<Strategy>,
    pub low_quality_preview: bool,
    /// Pages per chunk for chunked jobs
    pub chunk_size: Option<u32>,
}

/// Thresholds the policy compares against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    pub large_threshold: u64,
    pub chunk_threshold: u64,
    pub chunking_enabled: bool,
}

impl From<&RoutingConfig> for RoutingPolicy {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            large_threshold: config.large_threshold,
            chunk_threshold: config.chunk_threshold,
            chunking_enabled: config.chunking_enabled,
        }
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        (&crate::config::Config::default().routing).into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Backend(BackendKind),
    /// Handled by the reader; no backend is contacted
    ClientSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    pub target: RouteTarget,
    pub strategy: Strategy,
    /// Full content rather than metadata only
    pub extract_content: bool,
}

impl RouteDecision {
    fn direct(kind: BackendKind) -> Self {
        Self {
            target: RouteTarget::Backend(kind),
            strategy: Strategy::Direct,
            extract_content: true,
        }
    }
}

/// Choose a backend and strategy. First matching rule wins.
pub fn decide(
    file_type: FileType,
    file_size: u64,
    hints: &RouteHints,
    policy: &RoutingPolicy,
) -> RouteDecision {
    // Large or explicitly prioritized PDFs go to the PDF-specialized backend
    if file_type == FileType::Pdf
        && (file_size > policy.large_threshold || hints.priority_extraction)
    {
        let wants_chunks =
            hints.strategy == Some(Strategy::Chunked) || policy.chunking_enabled;
        let strategy = if file_size > policy.chunk_threshold && wants_chunks {
            Strategy::Chunked
        } else {
            Strategy::Direct
        };
        return RouteDecision {
            strategy,
            ..RouteDecision::direct(BackendKind::PyMuPdf)
        };
    }

    if file_type.is_office_document() {
        return RouteDecision {
            extract_content: !hints.low_quality_preview,
            ..RouteDecision::direct(BackendKind::Tika)
        };
    }

    if file_type.is_client_side() {
        return RouteDecision {
            target: RouteTarget::ClientSide,
            strategy: Strategy::Direct,
            extract_content: false,
        };
    }

    RouteDecision::direct(BackendKind::Unstructured)
}
