use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const GAME_NAME: &str = "Final Fantasy VII";

pub const STEAM_KEY_64: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall\Steam App 39140";
pub const STEAM_KEY_32: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall\Steam App 39140";
pub const RERELEASE_KEY: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\Uninstall\{141B8BA9-BFFD-4635-AF64-078E31010EC3}_is1";
pub const FF7_APP_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\WOW6432Node\Square Soft, Inc.\Final Fantasy VII";
pub const OLD_CONVERTER_KEY: &str =
    r"HKEY_LOCAL_MACHINE\SOFTWARE\WOW6432Node\Square Soft, Inc.\Final Fantasy VII\GameConverterkeys";
pub const COMPAT_FLAGS_KEY: &str =
    r"HKEY_CURRENT_USER\Software\Microsoft\Windows NT\CurrentVersion\AppCompatFlags\Layers";

const INSTALL_LOCATION: &str = "InstallLocation";
const APP_PATH: &str = "Path";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVersion {
    #[default]
    Unknown,
    /// The 1998 PC release.
    Original,
    Rereleased,
    /// Steam.
    DigitalDistribution,
}

impl GameVersion {
    pub fn label(self) -> &'static str {
        match self {
            GameVersion::Unknown => "unknown",
            GameVersion::Original => "original",
            GameVersion::Rereleased => "rerelease",
            GameVersion::DigitalDistribution => "steam",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "original" | "1998" | "original98" => Some(GameVersion::Original),
            "rerelease" | "re-release" => Some(GameVersion::Rereleased),
            "steam" | "digital" => Some(GameVersion::DigitalDistribution),
            "unknown" => Some(GameVersion::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationRecord {
    pub root_path: PathBuf,
    pub detected_version: GameVersion,
}

/// Caller-owned options for one conversion run.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionSettings {
    pub target_version: GameVersion,
    pub root_path: PathBuf,
    pub perform_backup: bool,
    pub remove_legacy_if_found: bool,
    pub relocate_if_protected: bool,
    pub relocation_target_path: PathBuf,
    pub use_alternate_keyboard_profile: bool,
}

impl ConversionSettings {
    pub fn new(target_version: GameVersion, root_path: PathBuf) -> Self {
        Self {
            target_version,
            root_path,
            perform_backup: true,
            remove_legacy_if_found: false,
            relocate_if_protected: false,
            relocation_target_path: default_relocation_target(),
            use_alternate_keyboard_profile: false,
        }
    }
}

pub fn default_relocation_target() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Games\Final Fantasy VII")
    } else {
        PathBuf::from("/opt/games/final-fantasy-vii")
    }
}

/// Scans the store for a known install, most specific release first.
/// Never cached; call again for every conversion attempt.
pub fn detect_installation(store: &dyn ConfigStore) -> InstallationRecord {
    let steam = [STEAM_KEY_64, STEAM_KEY_32]
        .iter()
        .find_map(|key| non_empty(store.get(key, INSTALL_LOCATION)));
    if let Some(path) = steam {
        return record(path, GameVersion::DigitalDistribution);
    }

    if let Some(path) = non_empty(store.get(RERELEASE_KEY, INSTALL_LOCATION)) {
        return record(path, GameVersion::Rereleased);
    }

    if let Some(path) = non_empty(store.get(FF7_APP_KEY, APP_PATH)) {
        return record(path, GameVersion::Original);
    }

    InstallationRecord {
        root_path: PathBuf::new(),
        detected_version: GameVersion::Unknown,
    }
}

pub fn install_location(store: &dyn ConfigStore) -> Option<PathBuf> {
    let record = detect_installation(store);
    match record.detected_version {
        GameVersion::Unknown => None,
        _ => Some(record.root_path),
    }
}

/// Key export targets for the configuration backup, in file order.
pub fn backup_keys(store: &dyn ConfigStore) -> Vec<(&'static str, &'static str)> {
    let steam = if store.get(STEAM_KEY_64, INSTALL_LOCATION).is_some() {
        STEAM_KEY_64
    } else {
        STEAM_KEY_32
    };
    vec![
        (steam, "FF7-01.reg"),
        (RERELEASE_KEY, "FF7-02.reg"),
        (FF7_APP_KEY, "FF7-03.reg"),
        (OLD_CONVERTER_KEY, "FF7-OldGC.reg"),
    ]
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn record(path: String, version: GameVersion) -> InstallationRecord {
    InstallationRecord {
        root_path: PathBuf::from(path.trim()),
        detected_version: version,
    }
}
