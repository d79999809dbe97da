//! Upload staging
//!
//! Streams the multipart `file` part to `UPLOAD_DIR` under a random name and
//! collects the routing hints sent alongside it.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::error::{AppError, Result};
use crate::parse::{discard_staged, ParseRequest};
use crate::routing::{FileType, RouteHints, Strategy};

struct StagedFile {
    path: PathBuf,
    file_name: String,
    size: u64,
}

/// Read the whole multipart body into a staged file plus hints.
///
/// Nothing is left on disk when this returns an error.
pub async fn stage_upload(multipart: Multipart, config: &UploadConfig) -> Result<ParseRequest> {
    let mut staged: Option<StagedFile> = None;
    let outcome = read_fields(multipart, config, &mut staged).await;

    match (outcome, staged) {
        (Ok((hints, modified_ms)), Some(file)) => {
            tracing::debug!(
                file = %file.file_name,
                size = file.size,
                path = %file.path.display(),
                "Staged upload"
            );
            Ok(ParseRequest {
                file_type: FileType::detect(&file.file_name),
                path: file.path,
                file_name: file.file_name,
                file_size: file.size,
                modified_ms,
                hints,
            })
        }
        (Ok(_), None) => Err(AppError::Validation(
            "No file provided. Use field name 'file'".to_string(),
        )),
        (Err(e), file) => {
            if let Some(file) = file {
                discard_staged(&file.path).await;
            }
            Err(e)
        }
    }
}

async fn read_fields(
    mut multipart: Multipart,
    config: &UploadConfig,
    staged: &mut Option<StagedFile>,
) -> Result<(RouteHints, Option<i64>)> {
    let mut hints = RouteHints::default();
    let mut modified_ms = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                if staged.is_some() {
                    return Err(AppError::Validation("Only one file per request".to_string()));
                }
                let file_name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .map(str::to_string)
                    .ok_or_else(|| AppError::Validation("File part has no filename".to_string()))?;
                let path = staged_path(&config.dir, &file_name);
                // Record the path first so a failed write is still cleaned up
                *staged = Some(StagedFile {
                    path: path.clone(),
                    file_name,
                    size: 0,
                });
                let size = write_field(field, &path, config).await?;
                if let Some(file) = staged.as_mut() {
                    file.size = size;
                }
            }
            "strategy" => {
                let raw = text(field).await?;
                hints.strategy = Some(
                    Strategy::parse(&raw)
                        .ok_or_else(|| invalid_field("strategy", &raw))?,
                );
            }
            "priorityExtraction" => {
                hints.priority_extraction = parse_flag("priorityExtraction", &text(field).await?)?
            }
            "lowQualityPreview" => {
                hints.low_quality_preview = parse_flag("lowQualityPreview", &text(field).await?)?
            }
            "chunkSize" => {
                let raw = text(field).await?;
                let pages = raw
                    .trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| invalid_field("chunkSize", &raw))?;
                hints.chunk_size = Some(pages);
            }
            "lastModified" => {
                let raw = text(field).await?;
                let ms = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| invalid_field("lastModified", &raw))?;
                modified_ms = Some(ms);
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok((hints, modified_ms))
}

/// Random name under `dir`, keeping the original extension
fn staged_path(dir: &Path, file_name: &str) -> PathBuf {
    let id = Uuid::new_v4();
    match Path::new(file_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => dir.join(format!("{}.{}", id, ext.to_lowercase())),
        None => dir.join(id.to_string()),
    }
}

async fn write_field(mut field: Field<'_>, path: &Path, config: &UploadConfig) -> Result<u64> {
    tokio::fs::create_dir_all(&config.dir).await?;
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file data: {}", e)))?
    {
        written += chunk.len() as u64;
        if written > config.max_bytes {
            return Err(AppError::Validation(format!(
                "File exceeds the {} byte upload limit",
                config.max_bytes
            )));
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

async fn text(field: Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read form field: {}", e)))
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid_field(name, raw)),
    }
}

fn invalid_field(name: &str, raw: &str) -> AppError {
    AppError::Validation(format!("Invalid value for {}: {:?}", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_path_keeps_extension() {
        let path = staged_path(Path::new("/tmp/uploads"), "Report.PDF");
        assert_eq!(path.extension().unwrap(), "pdf");
        assert!(path.starts_with("/tmp/uploads"));

        let bare = staged_path(Path::new("/tmp/uploads"), "README");
        assert!(bare.extension().is_none());
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("x", "true").unwrap());
        assert!(parse_flag("x", " 1 ").unwrap());
        assert!(!parse_flag("x", "false").unwrap());
        assert!(matches!(parse_flag("x", "maybe"), Err(AppError::Validation(_))));
    }
}
