//! Upstream components that make up the bundle.
//!
//! The set of components is closed: every upstream package is a variant of
//! [`Component`], and everything the pipeline needs to know about it (where
//! its releases live, which asset to pick, how to lay the asset out, whether
//! its absence is fatal) comes from the exhaustive `match`es below. Adding or
//! removing a component is an edit to this file only.

use std::fmt::Display;

/// Role of a component in the merge order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Merged first; any failure aborts the run.
    Base,
    /// Merged on top of the base; failures are logged and skipped.
    Overlay,
}

/// Shape of the downloadable asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Zip archive whose payload root is found by the structure resolver.
    Archive,
    /// Single file copied verbatim to each of the given bundle-relative paths.
    File { placements: &'static [&'static str] },
}

/// One upstream package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    Atmosphere,
    Fusee,
    Hekate,
    SysDvr,
    LdnMitm,
    SysBotbase,
    Ftpd,
    Jksv,
}

impl Component {
    /// All components in integration order. The base component comes first.
    pub const ALL: [Component; 8] = [
        Component::Atmosphere,
        Component::Fusee,
        Component::Hekate,
        Component::SysDvr,
        Component::LdnMitm,
        Component::SysBotbase,
        Component::Ftpd,
        Component::Jksv,
    ];

    /// Stable key used in the version state and in pipeline outputs.
    pub fn key(self) -> &'static str {
        match self {
            Component::Atmosphere => "cfw",
            Component::Fusee => "fusee",
            Component::Hekate => "bootloader",
            Component::SysDvr => "sysdvr",
            Component::LdnMitm => "ldn_mitm",
            Component::SysBotbase => "sys_botbase",
            Component::Ftpd => "ftpd",
            Component::Jksv => "jksv",
        }
    }

    /// Human-readable name for logs and release notes.
    pub fn display_name(self) -> &'static str {
        match self {
            Component::Atmosphere => "Atmosphère",
            Component::Fusee => "fusee",
            Component::Hekate => "Hekate",
            Component::SysDvr => "SysDVR",
            Component::LdnMitm => "ldn_mitm",
            Component::SysBotbase => "sys-botbase",
            Component::Ftpd => "ftpd",
            Component::Jksv => "JKSV",
        }
    }

    /// Short description of what the component contributes.
    pub fn purpose(self) -> &'static str {
        match self {
            Component::Atmosphere => "Custom Firmware",
            Component::Fusee => "Atmosphère payload",
            Component::Hekate => "Bootloader",
            Component::SysDvr => "Video streaming",
            Component::LdnMitm => "Online play (LAN)",
            Component::SysBotbase => "Bot framework",
            Component::Ftpd => "FTP server",
            Component::Jksv => "Save manager",
        }
    }

    /// GitHub `owner/repo` publishing the component's releases.
    pub fn repository(self) -> &'static str {
        match self {
            Component::Atmosphere | Component::Fusee => "Atmosphere-NX/Atmosphere",
            Component::Hekate => "CTCaer/hekate",
            Component::SysDvr => "exelix11/SysDVR",
            Component::LdnMitm => "Lusamine/ldn_mitm",
            Component::SysBotbase => "bdawg1989/sys-botbase",
            Component::Ftpd => "mtheall/ftpd",
            Component::Jksv => "J-D-K/JKSV",
        }
    }

    /// Case-insensitive substring selecting the asset among a release's assets.
    pub fn asset_pattern(self) -> &'static str {
        match self {
            Component::Atmosphere => "atmosphere",
            Component::Fusee => "fusee.bin",
            Component::Hekate => "hekate_ctcaer",
            Component::SysDvr => "sysdvr.zip",
            Component::LdnMitm => "ldn_mitm",
            Component::SysBotbase => ".zip",
            Component::Ftpd => "ftpd.nro",
            Component::Jksv => "JKSV.nro",
        }
    }

    pub fn asset_kind(self) -> AssetKind {
        match self {
            Component::Fusee => AssetKind::File {
                placements: &["fusee.bin", "bootloader/payloads/fusee.bin"],
            },
            Component::Ftpd => AssetKind::File {
                placements: &["switch/ftpd.nro"],
            },
            Component::Jksv => AssetKind::File {
                placements: &["switch/JKSV.nro"],
            },
            Component::Atmosphere
            | Component::Hekate
            | Component::SysDvr
            | Component::LdnMitm
            | Component::SysBotbase => AssetKind::Archive,
        }
    }

    pub fn role(self) -> Role {
        match self {
            Component::Atmosphere => Role::Base,
            _ => Role::Overlay,
        }
    }

    pub fn is_base(self) -> bool {
        self.role() == Role::Base
    }

    /// The component whose version names the bundle.
    pub fn base() -> Component {
        Component::ALL
            .into_iter()
            .find(|c| c.is_base())
            .unwrap_or(Component::Atmosphere)
    }

    /// File name the downloaded asset is stored under in the work directory.
    pub fn download_name(self) -> String {
        match self.asset_kind() {
            AssetKind::Archive => format!("{}.zip", self.key()),
            AssetKind::File { placements } => placements
                .first()
                .and_then(|p| p.rsplit('/').next())
                .map(String::from)
                .unwrap_or_else(|| self.key().to_string()),
        }
    }

    /// Looks up a component by its state key.
    pub fn from_key(key: &str) -> Option<Component> {
        Component::ALL.into_iter().find(|c| c.key() == key)
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn exactly_one_base_and_it_comes_first() {
        let bases: Vec<_> = Component::ALL.iter().filter(|c| c.is_base()).collect();
        assert_eq!(bases.len(), 1);
        assert!(Component::ALL[0].is_base());
        assert_eq!(Component::base(), Component::Atmosphere);
    }

    #[test]
    fn keys_are_unique_and_round_trip() {
        let keys: HashSet<_> = Component::ALL.iter().map(|c| c.key()).collect();
        assert_eq!(keys.len(), Component::ALL.len());
        for c in Component::ALL {
            assert_eq!(Component::from_key(c.key()), Some(c));
        }
        assert_eq!(Component::from_key("unknown"), None);
    }

    #[test]
    fn fusee_is_integrated_before_hekate() {
        let pos = |c| Component::ALL.iter().position(|x| *x == c).unwrap();
        assert!(pos(Component::Fusee) < pos(Component::Hekate));
    }

    #[test]
    fn download_names() {
        assert_eq!(Component::Hekate.download_name(), "bootloader.zip");
        assert_eq!(Component::Fusee.download_name(), "fusee.bin");
        assert_eq!(Component::Jksv.download_name(), "JKSV.nro");
    }
}
