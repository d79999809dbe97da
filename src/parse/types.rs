//! Parse request and result types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::routing::{FileType, RouteHints};

/// Outcome reported in the response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    Success,
    Error,
    /// The reader renders this format itself
    ClientProcessing,
    /// A background job is still running
    Processing,
}

impl ParseStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ParseStatus::Processing)
    }
}

/// A staged upload waiting to be parsed
#[derive(Debug, Clone)]
pub struct ParseRequest {
    /// Where the upload was staged on disk
    pub path: PathBuf,
    /// Name the client uploaded the file under
    pub file_name: String,
    pub file_type: FileType,
    pub file_size: u64,
    /// Client-reported modification time (ms since epoch)
    pub modified_ms: Option<i64>,
    pub hints: RouteHints,
}

/// Response envelope for every parse endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    pub status: ParseStatus,
    /// Backend that produced the payload
    pub parser: String,
    /// Backend-defined payload, passed through untouched
    pub data: Value,
    pub file_name: String,
    pub file_size: u64,
    pub detected_type: FileType,
    /// Milliseconds spent producing this result
    pub processing_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl ParseResult {
    /// Result skeleton echoing the request's file metadata
    pub fn for_request(
        request: &ParseRequest,
        status: ParseStatus,
        parser: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            status,
            parser: parser.into(),
            data,
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            detected_type: request.file_type,
            processing_time: 0,
            job_id: None,
            cached: None,
        }
    }

    pub fn with_processing_time(mut self, millis: u64) -> Self {
        self.processing_time = millis;
        self
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    /// Copy marked as served from the cache
    pub fn as_cached(&self) -> Self {
        Self {
            cached: Some(true),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_field_names() {
        let result = ParseResult {
            status: ParseStatus::ClientProcessing,
            parser: "client".into(),
            data: Value::Null,
            file_name: "book.epub".into(),
            file_size: 42,
            detected_type: FileType::Epub,
            processing_time: 3,
            job_id: None,
            cached: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "client_processing");
        assert_eq!(json["fileName"], "book.epub");
        assert_eq!(json["detectedType"], "epub");
        assert_eq!(json["processingTime"], 3);
        assert!(json.get("cached").is_none());
        assert!(json.get("jobId").is_none());

        assert_eq!(result.as_cached().cached, Some(true));
    }
}
