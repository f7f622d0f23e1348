use crate::{
    game,
    location::ProtectedLocations,
    media::{self, MountLocator},
};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

const APP_DIR_NAME: &str = "ff7-convert";

/// Read-only inputs shipped with the converter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// OpenGL driver bundle: `plugins/`, `shaders/` and `ff7_opengl.*`.
    pub driver_bundle: PathBuf,
    /// Holds the provided `ff7.exe` and `FF7Config.exe`.
    pub launcher_dir: PathBuf,
}

impl Resources {
    fn under(data_dir: &Path) -> Self {
        let base = data_dir.join("resources");
        Self {
            driver_bundle: base.join("Game Driver"),
            launcher_dir: base.join("ff7"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub resources: Resources,
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
    /// Added to the platform's protected folders.
    #[serde(default)]
    pub protected_locations: Vec<PathBuf>,
    #[serde(default = "media::default_mount_roots")]
    pub mount_roots: Vec<PathBuf>,
    /// Volume label to mount path, for images mounted somewhere unusual.
    #[serde(default)]
    pub media_overrides: BTreeMap<String, PathBuf>,
    #[serde(default = "game::default_relocation_target")]
    pub relocation_target: PathBuf,
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir).context("create app data dir")?;
        let path = data_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let mut config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            config.data_dir = data_dir.to_path_buf();
            return Ok(config);
        }

        let config = AppConfig {
            data_dir: data_dir.to_path_buf(),
            resources: Resources::under(data_dir),
            store_path: None,
            rules_path: None,
            protected_locations: Vec::new(),
            mount_roots: media::default_mount_roots(),
            media_overrides: BTreeMap::new(),
            relocation_target: game::default_relocation_target(),
        };
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).context("create app data dir")?;
        let path = self.data_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn store_path(&self) -> PathBuf {
        self.store_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("store.json"))
    }

    pub fn rules_path(&self) -> PathBuf {
        self.rules_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("rules.json"))
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("converter.log")
    }

    pub fn protected_locations(&self) -> ProtectedLocations {
        ProtectedLocations::for_platform(&self.protected_locations)
    }

    pub fn media_locator(&self) -> MountLocator {
        MountLocator::new(self.media_overrides.clone(), self.mount_roots.clone())
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join(APP_DIR_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn first_load_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load_or_create_in(dir.path()).unwrap();
        assert!(dir.path().join("config.json").is_file());
        assert_eq!(
            config.resources.driver_bundle,
            dir.path().join("resources").join("Game Driver")
        );
        assert_eq!(config.store_path(), dir.path().join("store.json"));
        assert_eq!(config.log_path(), dir.path().join("converter.log"));
    }

    #[test]
    fn saved_changes_survive_reload() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::load_or_create_in(dir.path()).unwrap();
        config
            .media_overrides
            .insert("ff7disc1".to_string(), PathBuf::from("/iso/disc1"));
        config.protected_locations.push(PathBuf::from("/srv/protected"));
        config.save().unwrap();

        let reloaded = AppConfig::load_or_create_in(dir.path()).unwrap();
        assert_eq!(
            reloaded.media_overrides.get("ff7disc1"),
            Some(&PathBuf::from("/iso/disc1"))
        );
        assert!(reloaded
            .protected_locations()
            .prefixes()
            .contains(&PathBuf::from("/srv/protected")));
        assert_eq!(reloaded.data_dir, dir.path());
    }
}
