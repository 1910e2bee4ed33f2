//! Release source resolution.
//!
//! A [`ReleaseSource`] answers two questions for a component: what is the
//! latest release (tag and assets), and how do I get the bytes of one asset.
//! The pipeline only talks to the trait; [`GitHubSource`] is the production
//! implementation.

mod github;

pub use github::{DEFAULT_API_URL, GitHubSource};

use crate::bundler::{Error, Result, Step};
use crate::component::Component;
use serde::Deserialize;
use std::path::Path;

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub download_url: String,
}

/// Latest release of an upstream repository.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl ReleaseInfo {
    /// First asset whose name contains `pattern`, ignoring case.
    pub fn select_asset(&self, pattern: &str) -> Option<&ReleaseAsset> {
        let pattern = pattern.to_lowercase();
        self.assets
            .iter()
            .find(|asset| asset.name.to_lowercase().contains(&pattern))
    }
}

/// The release and asset chosen for one component in this run.
#[derive(Debug, Clone)]
pub struct ComponentRelease {
    pub component: Component,
    pub tag: String,
    pub asset: ReleaseAsset,
}

/// Where component releases come from.
#[allow(async_fn_in_trait)]
pub trait ReleaseSource {
    /// Most recent release of `repository` (`owner/repo`).
    async fn latest_release(&self, repository: &str) -> Result<ReleaseInfo>;

    /// Stores the content of `asset` at `dest`.
    async fn download(&self, asset: &ReleaseAsset, dest: &Path) -> Result<()>;
}

/// Fetches the latest release of `component` and picks its asset.
///
/// A release without a matching asset is an error: the bundle cannot be
/// reproduced without every component.
pub async fn fetch_component<S: ReleaseSource>(
    source: &S,
    component: Component,
) -> Result<ComponentRelease> {
    let key = component.key();
    let release = source
        .latest_release(component.repository())
        .await
        .map_err(|e| Error::component(key, Step::Fetch, e))?;

    let asset = release
        .select_asset(component.asset_pattern())
        .cloned()
        .ok_or_else(|| {
            Error::component(
                key,
                Step::Fetch,
                format!(
                    "release {} of {} has no asset matching '{}'",
                    release.tag_name,
                    component.repository(),
                    component.asset_pattern()
                ),
            )
        })?;

    log::info!(
        "{}: latest release {} (asset {})",
        component,
        release.tag_name,
        asset.name
    );

    Ok(ComponentRelease {
        component,
        tag: release.tag_name,
        asset,
    })
}

/// Fetches every component in integration order.
///
/// Stops at the first failure; no partial result is returned.
pub async fn fetch_all<S: ReleaseSource>(source: &S) -> Result<Vec<ComponentRelease>> {
    let mut releases = Vec::with_capacity(Component::ALL.len());
    for component in Component::ALL {
        releases.push(fetch_component(source, component).await?);
    }
    Ok(releases)
}
