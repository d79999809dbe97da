//! Runtime provisioning
//!
//! The Tika server ships as a single jar. When it is missing it is
//! downloaded next to its final location and renamed into place, so a
//! partial download never looks like a usable jar.

use std::path::Path;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::backends::BackendKind;

use super::SupervisorError;

/// Make sure the jar at `jar_path` exists, downloading it from `url` if not
pub async fn ensure_jar(
    client: &reqwest::Client,
    jar_path: &Path,
    url: &str,
) -> Result<(), SupervisorError> {
    if tokio::fs::try_exists(jar_path).await.unwrap_or(false) {
        tracing::debug!(path = %jar_path.display(), "Tika jar present");
        return Ok(());
    }

    tracing::info!(path = %jar_path.display(), url, "Downloading Tika server jar");

    let partial = jar_path.with_extension("jar.part");
    match download(client, url, jar_path, &partial).await {
        Ok(bytes) => {
            tracing::info!(path = %jar_path.display(), bytes, "Tika server jar ready");
            Ok(())
        }
        Err(message) => {
            let _ = tokio::fs::remove_file(&partial).await;
            Err(SupervisorError::ProvisioningFailed {
                backend: BackendKind::Tika.name().to_string(),
                message,
            })
        }
    }
}

async fn download(
    client: &reqwest::Client,
    url: &str,
    jar_path: &Path,
    partial: &Path,
) -> Result<u64, String> {
    if let Some(dir) = jar_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| format!("cannot create {}: {}", dir.display(), e))?;
    }

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("download failed: {}", e))?;
    if !response.status().is_success() {
        return Err(format!("download failed: HTTP {}", response.status()));
    }

    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| format!("cannot create {}: {}", partial.display(), e))?;

    let mut written = 0u64;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| format!("download interrupted: {}", e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("write failed: {}", e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| format!("write failed: {}", e))?;
    drop(file);

    tokio::fs::rename(partial, jar_path)
        .await
        .map_err(|e| format!("cannot move jar into place: {}", e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_existing_jar_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("tika-server.jar");
        std::fs::write(&jar, b"jar").unwrap();

        // Unreachable URL proves no request is made
        ensure_jar(&reqwest::Client::new(), &jar, "http://127.0.0.1:9/tika.jar")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&jar).unwrap(), b"jar");
    }

    #[tokio::test]
    async fn test_downloads_missing_jar() {
        let base = serve(Router::new().route("/tika.jar", get(|| async { "PK-jar-bytes" }))).await;
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib").join("tika-server.jar");

        ensure_jar(&reqwest::Client::new(), &jar, &format!("{}/tika.jar", base))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&jar).unwrap(), b"PK-jar-bytes");
        assert!(!jar.with_extension("jar.part").exists());
    }

    #[tokio::test]
    async fn test_failed_download_leaves_nothing_behind() {
        let base = serve(Router::new()).await;
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("tika-server.jar");

        let err = ensure_jar(&reqwest::Client::new(), &jar, &format!("{}/missing.jar", base))
            .await
            .unwrap_err();

        assert!(matches!(err, SupervisorError::ProvisioningFailed { ref message, .. } if message.contains("404")));
        assert!(!jar.exists());
        assert!(!jar.with_extension("jar.part").exists());
    }
}
