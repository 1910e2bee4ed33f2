//! GitHub releases API implementation of [`ReleaseSource`].

use super::{ReleaseAsset, ReleaseInfo, ReleaseSource};
use crate::bundler::utils::http;
use crate::bundler::{Context, Error, Result};
use std::path::Path;

/// Public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Reads releases through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubSource {
    client: reqwest::Client,
    api_url: String,
}

impl GitHubSource {
    /// Creates a source talking to `api_url` (no trailing slash needed).
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: http::github_client(token)?,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ReleaseSource for GitHubSource {
    async fn latest_release(&self, repository: &str) -> Result<ReleaseInfo> {
        // `/releases` lists newest first, including prereleases.
        let url = format!("{}/repos/{}/releases?per_page=1", self.api_url, repository);
        log::debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GenericError(format!(
                "GitHub API returned HTTP {} for {}: {}",
                status,
                repository,
                body.trim()
            )));
        }

        let releases: Vec<ReleaseInfo> = response.json().await?;
        releases
            .into_iter()
            .next()
            .with_context(|| format!("{} has no releases", repository))
    }

    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<()> {
        http::download(&self.client, &asset.download_url, dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_is_normalized() {
        let source = GitHubSource::new("https://ghe.example.invalid/api/v3/", Some("t")).unwrap();
        assert_eq!(source.api_url, "https://ghe.example.invalid/api/v3");
    }

    #[test]
    fn release_listing_parses() {
        let json = r#"[{
            "tag_name": "1.9.0",
            "name": "Atmosphère 1.9.0",
            "prerelease": false,
            "assets": [
                {"name": "atmosphere-1.9.0.zip", "browser_download_url": "https://example.invalid/a.zip", "size": 1},
                {"name": "fusee.bin", "browser_download_url": "https://example.invalid/fusee.bin"}
            ]
        }]"#;
        let releases: Vec<ReleaseInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(releases[0].tag_name, "1.9.0");
        assert_eq!(
            releases[0].select_asset("FUSEE").map(|a| a.name.as_str()),
            Some("fusee.bin")
        );
    }
}
