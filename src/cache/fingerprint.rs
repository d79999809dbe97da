//! Cache fingerprints
//!
//! A fingerprint is derived from file metadata (basename, byte size,
//! modification time), not from file content. Two different files sharing
//! all three collide on the same cache entry.

use std::path::Path;
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint from raw metadata
    pub fn from_parts(file_name: &str, size: u64, modified_ms: i64) -> Self {
        let basename = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);

        let mut hasher = Sha256::new();
        hasher.update(basename.as_bytes());
        hasher.update([0u8]);
        hasher.update(size.to_le_bytes());
        hasher.update([0u8]);
        hasher.update(modified_ms.to_le_bytes());
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Fingerprint for a staged upload.
    ///
    /// Uses the client-reported modification time when present, otherwise the
    /// staged file's own mtime.
    pub async fn for_upload(
        path: &Path,
        file_name: &str,
        size: u64,
        client_modified_ms: Option<i64>,
    ) -> std::io::Result<Self> {
        let modified_ms = match client_modified_ms {
            Some(ms) => ms,
            None => {
                let modified = tokio::fs::metadata(path).await?.modified()?;
                modified
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_millis() as i64)
                    .unwrap_or(0)
            }
        };
        Ok(Self::from_parts(file_name, size, modified_ms))
    }

    /// Key for entries that are not file results (background jobs)
    pub fn from_key(key: impl Into<String>) -> Self {
        Fingerprint(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
