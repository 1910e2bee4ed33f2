//! Publishing the bundle as a GitHub release.

use crate::bail;
use crate::bundler::error::{Error, ErrorExt, Result};
use crate::bundler::utils::http;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything needed to create one release.
#[derive(Debug, Clone)]
pub struct ReleaseDraft {
    /// Release identifier, also used as the git tag.
    pub tag: String,
    pub title: String,
    pub body: String,
    /// Archive uploaded as the release's only asset.
    pub archive: PathBuf,
}

/// Result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Release created; carries its web URL.
    Created(String),
    /// A release with the same identifier already exists; nothing was done.
    AlreadyExists,
}

/// Where finished bundles are published.
#[allow(async_fn_in_trait)]
pub trait ReleasePublisher {
    async fn publish(&self, draft: &ReleaseDraft) -> Result<PublishOutcome>;
}

#[derive(Serialize)]
struct CreateRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    prerelease: bool,
}

#[derive(Deserialize)]
struct CreatedRelease {
    html_url: String,
    upload_url: String,
}

/// Publishes through the GitHub REST API into `owner/repo`.
#[derive(Debug, Clone)]
pub struct GitHubPublisher {
    client: reqwest::Client,
    api_url: String,
    repository: String,
}

impl GitHubPublisher {
    pub fn new(api_url: &str, repository: &str, token: &str) -> Result<Self> {
        Ok(Self {
            client: http::github_client(Some(token))?,
            api_url: api_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
        })
    }

    async fn exists(&self, tag: &str) -> Result<bool> {
        let url = format!(
            "{}/repos/{}/releases/tags/{}",
            self.api_url, self.repository, tag
        );
        let response = self.client.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(Error::GenericError(format!(
                "looking up release {tag} returned HTTP {status}"
            ))),
        }
    }

    async fn upload(&self, upload_url: &str, archive: &Path) -> Result<()> {
        let url = asset_upload_url(upload_url, archive)?;
        let bytes = bytes::Bytes::from(
            tokio::fs::read(archive)
                .await
                .fs_context("reading archive for upload", archive)?,
        );

        log::info!("⬆️ Uploading {} ({} bytes)", archive.display(), bytes.len());
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/zip")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenericError(format!(
                "asset upload returned HTTP {status}: {}",
                body.trim()
            )));
        }
        Ok(())
    }
}

impl ReleasePublisher for GitHubPublisher {
    async fn publish(&self, draft: &ReleaseDraft) -> Result<PublishOutcome> {
        if self.exists(&draft.tag).await? {
            log::warn!("Release {} already exists, skipping publish", draft.tag);
            return Ok(PublishOutcome::AlreadyExists);
        }

        let url = format!("{}/repos/{}/releases", self.api_url, self.repository);
        let response = self
            .client
            .post(&url)
            .json(&CreateRelease {
                tag_name: &draft.tag,
                name: &draft.title,
                body: &draft.body,
                draft: false,
                prerelease: false,
            })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            if body.contains("already_exists") {
                log::warn!("Release {} was created concurrently, skipping", draft.tag);
                return Ok(PublishOutcome::AlreadyExists);
            }
            return Err(Error::GenericError(format!(
                "creating release {} was rejected: {}",
                draft.tag,
                body.trim()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenericError(format!(
                "creating release {} returned HTTP {status}: {}",
                draft.tag,
                body.trim()
            )));
        }

        let created: CreatedRelease = response.json().await?;
        self.upload(&created.upload_url, &draft.archive).await?;

        log::info!("✓ Published {}", created.html_url);
        Ok(PublishOutcome::Created(created.html_url))
    }
}

/// Turns the hypermedia `upload_url` (`…/assets{?name,label}`) into the
/// concrete upload endpoint for `archive`.
fn asset_upload_url(upload_url: &str, archive: &Path) -> Result<url::Url> {
    let base = upload_url
        .split_once('{')
        .map_or(upload_url, |(base, _)| base);
    let Some(name) = archive.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        bail!("{} has no file name", archive.display());
    };

    let mut url = url::Url::parse(base)
        .map_err(|e| Error::GenericError(format!("invalid upload URL {base}: {e}")))?;
    url.query_pairs_mut().clear().append_pair("name", &name);
    Ok(url)
}
