//! HTTP utilities for talking to GitHub and downloading release assets.

use crate::bundler::error::{Error, ErrorExt, Result};
use futures_lite::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Media type for GitHub REST API JSON responses.
pub const GITHUB_JSON: &str = "application/vnd.github.v3+json";

/// Media type requesting raw asset bytes.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Builds a client carrying the GitHub headers every request needs.
///
/// The token is optional: anonymous access works for public repositories,
/// only with a much lower rate limit.
pub fn github_client(token: Option<&str>) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_static(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));

    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| Error::GenericError(format!("Invalid GitHub token: {}", e)))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    Ok(reqwest::Client::builder().default_headers(headers).build()?)
}

/// Downloads `url` to `dest`, streaming the body to disk.
///
/// Non-success status codes are errors; a partially written file is removed.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    log::info!("Downloading {}", url);

    let response = client
        .get(url)
        .header(ACCEPT, OCTET_STREAM)
        .send()
        .await
        .map_err(|e| Error::GenericError(format!("Download failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::GenericError(format!(
            "Download of {} failed with HTTP {}",
            url, status
        )));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .fs_context("creating download directory", parent)?;
    }

    let result = write_body(response, dest).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(dest).await;
    }
    let written = result?;

    log::debug!("Wrote {} bytes to {}", written, dest.display());
    Ok(written)
}

async fn write_body(response: reqwest::Response, dest: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(dest)
        .await
        .fs_context("creating download file", dest)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::GenericError(format!("Failed to read response: {}", e)))?;
        file.write_all(&chunk)
            .await
            .fs_context("writing download file", dest)?;
        written += chunk.len() as u64;
    }

    file.flush().await.fs_context("flushing download file", dest)?;
    Ok(written)
}
