//! Synthetic payload trees.
//!
//! Not every input arrives as an archive with an SD card layout: some
//! components publish a single file, and the repository ships a few local
//! assets (bootloader config and artwork). Both are laid out in a staging
//! directory first and then merged like any other payload, so the merge
//! engine stays the only writer of component content.

use super::error::Result;
use super::resolve::PayloadRoot;
use super::utils::fs;
use std::path::Path;

/// Where a local asset goes in the bundle.
#[derive(Debug, Clone, Copy)]
pub struct AssetPlacement {
    /// File name inside the assets directory.
    pub source: &'static str,
    /// Bundle-relative destinations.
    pub destinations: &'static [&'static str],
}

/// Local assets copied over the merged components.
pub const LOCAL_ASSETS: &[AssetPlacement] = &[
    AssetPlacement {
        source: "hekate_ipl.ini",
        destinations: &["bootloader/hekate_ipl.ini"],
    },
    AssetPlacement {
        source: "background.bmp",
        destinations: &["bootloader/background.bmp", "bootloader/res/background.bmp"],
    },
    AssetPlacement {
        source: "icon_payload.bmp",
        destinations: &["bootloader/res/icon_payload.bmp"],
    },
    AssetPlacement {
        source: "icon_switch.bmp",
        destinations: &["bootloader/res/icon_switch.bmp"],
    },
];

/// Directories created whenever local assets are applied.
const LOCAL_ASSET_DIRS: &[&str] = &["bootloader/res"];

/// Lays a single downloaded file out at each of `placements`.
pub fn stage_file(file: &Path, placements: &[&str], staging: &Path) -> Result<PayloadRoot> {
    fs::create_dir_all(staging)?;
    for placement in placements {
        fs::copy_file(file, &staging.join(placement))?;
    }
    Ok(PayloadRoot::staged(staging.to_path_buf()))
}

/// Lays out the repository's local assets.
///
/// Returns `None` when the assets directory does not exist. Individual
/// missing assets are logged and skipped.
pub fn stage_local_assets(assets_dir: &Path, staging: &Path) -> Result<Option<PayloadRoot>> {
    if !assets_dir.is_dir() {
        log::warn!(
            "Assets directory {} not found, skipping local assets",
            assets_dir.display()
        );
        return Ok(None);
    }

    for dir in LOCAL_ASSET_DIRS {
        fs::create_dir_all(&staging.join(dir))?;
    }

    for asset in LOCAL_ASSETS {
        let source = assets_dir.join(asset.source);
        if !source.is_file() {
            log::warn!("{} not found in {}", asset.source, assets_dir.display());
            continue;
        }
        for destination in asset.destinations {
            fs::copy_file(&source, &staging.join(destination))?;
            log::info!("✓ {} → {}", asset.source, destination);
        }
    }

    Ok(Some(PayloadRoot::staged(staging.to_path_buf())))
}
