//! Standalone upkeep that runs outside a full conversion.

use crate::{
    backup,
    config::Resources,
    convert, driver, fs_utils,
    manifest::{CURRENT_APP, DIRECT_SUBFOLDERS, DRIVER_DESCRIPTOR, LEGACY_CONVERTER, MOD_FOLDERS},
    progress::ProgressSink,
    store::ConfigStore,
};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriverStatus {
    UpToDate,
    Updated { backup_dir: PathBuf },
}

/// Compares the installed driver descriptor with the bundled one. When they
/// differ, backs up the config keys and both manifests into a new backup dir,
/// clears caches and legacy files, then copies the whole driver bundle over
/// the install. The launchers moved out with the manifest are put back from
/// the provided copies.
pub fn check_driver_freshness(
    resources: &Resources,
    install_root: &Path,
    store: &mut dyn ConfigStore,
    progress: &mut dyn ProgressSink,
) -> Result<DriverStatus> {
    if !install_root.is_dir() {
        bail!("install root {:?} is missing", install_root);
    }
    let bundle = &resources.driver_bundle;
    if fs_utils::files_equal(
        &install_root.join(DRIVER_DESCRIPTOR),
        &bundle.join(DRIVER_DESCRIPTOR),
    ) {
        progress.on_message(&format!("\t{DRIVER_DESCRIPTOR} file is up to date."));
        return Ok(DriverStatus::UpToDate);
    }
    if !bundle.is_dir() {
        bail!("driver bundle {:?} is missing", bundle);
    }

    let backup_dir = backup::create_backup_dir(install_root, Some("driver update"))?;
    progress.on_message(&format!(
        "\tattempting backup of files to {} ...",
        backup_dir.display()
    ));
    backup::backup_configuration(&*store, &backup_dir)?;
    backup::relocate_manifest(&LEGACY_CONVERTER, install_root, &backup_dir)?;
    backup::relocate_manifest(&CURRENT_APP, install_root, &backup_dir)?;
    convert::delete_cache_files(install_root)?;
    convert::delete_legacy_files(install_root, store)?;

    progress.on_message(&format!(
        "\tcopying all files in {} to {} ...",
        bundle.display(),
        install_root.display()
    ));
    let copied = fs_utils::copy_dir_recursive(bundle, install_root)
        .context("copy driver bundle")?;
    driver::replace_launchers(resources, install_root).context("restore launchers")?;
    info!(copied, backup = %backup_dir.display(), "driver updated");
    Ok(DriverStatus::Updated { backup_dir })
}

/// Creates the folder tree the mod loader expects. Purely additive; a folder
/// that cannot be created is logged and skipped.
pub fn create_missing_folders(install_root: &Path, progress: &mut dyn ProgressSink) -> usize {
    let direct = Path::new("direct");
    let wanted = MOD_FOLDERS
        .iter()
        .map(PathBuf::from)
        .chain(DIRECT_SUBFOLDERS.iter().map(|name| direct.join(name)));

    let mut created = 0;
    for relative in wanted {
        let path = install_root.join(relative);
        if path.is_dir() {
            continue;
        }
        progress.on_message(&format!("\tcreating missing directory {}", path.display()));
        match fs::create_dir_all(&path) {
            Ok(()) => created += 1,
            Err(err) => warn!(path = %path.display(), error = %err, "could not create folder"),
        }
    }
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::OLD_CONVERTER_KEY,
        progress::testing::RecordingSink,
        store::FileStore,
    };
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn resources(dir: &Path) -> Resources {
        let resources = Resources {
            driver_bundle: dir.join("bundle"),
            launcher_dir: dir.join("launchers"),
        };
        write(&resources.driver_bundle.join("ff7_opengl.fgd"), "driver v2");
        write(&resources.driver_bundle.join("shaders/main.frag"), "frag");
        write(&resources.launcher_dir.join("ff7.exe"), "new launcher");
        write(&resources.launcher_dir.join("FF7Config.exe"), "new config");
        resources
    }

    #[test]
    fn matching_driver_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let resources = resources(dir.path());
        let root = dir.path().join("ff7");
        write(&root.join("ff7_opengl.fgd"), "driver v2");
        write(&root.join("SMD.P"), "cache");

        let mut store = FileStore::in_memory();
        let mut sink = RecordingSink::default();
        let status = check_driver_freshness(&resources, &root, &mut store, &mut sink).unwrap();

        assert_eq!(status, DriverStatus::UpToDate);
        assert!(root.join("SMD.P").is_file());
        assert!(!root.join("BackupGC2020").exists());
        assert!(sink.messages[0].contains("up to date"));
    }

    #[test]
    fn stale_driver_is_backed_up_and_replaced() {
        let dir = TempDir::new().unwrap();
        let resources = resources(dir.path());
        let root = dir.path().join("ff7");
        write(&root.join("ff7_opengl.fgd"), "driver v1");
        write(&root.join("app.log"), "log");
        write(&root.join("SMD.P"), "cache");
        write(&root.join("LOADR/loader.exe"), "old");

        let mut store = FileStore::in_memory();
        store.set(OLD_CONVERTER_KEY, "Installed", "1").unwrap();
        let mut sink = RecordingSink::default();
        let status = check_driver_freshness(&resources, &root, &mut store, &mut sink).unwrap();

        let DriverStatus::Updated { backup_dir } = status else {
            panic!("expected an update");
        };
        assert!(backup_dir.join("app.log").is_file());
        assert!(backup_dir.join("LOADR/loader.exe").is_file());
        assert!(!root.join("LOADR").exists());
        assert!(!root.join("SMD.P").exists());
        assert_eq!(
            fs::read_to_string(root.join("ff7_opengl.fgd")).unwrap(),
            "driver v2"
        );
        assert!(root.join("shaders/main.frag").is_file());
        assert!(store.get(OLD_CONVERTER_KEY, "Installed").is_none());
        assert!(backup_dir.join("FF7-OldGC.reg").is_file());
    }

    #[test]
    fn driver_update_leaves_launchers_in_place() {
        let dir = TempDir::new().unwrap();
        let resources = resources(dir.path());
        let root = dir.path().join("ff7");
        write(&root.join("ff7_opengl.fgd"), "driver v1");
        write(&root.join("ff7.exe"), "old launcher");
        write(&root.join("FF7Config.exe"), "old config");

        let mut store = FileStore::in_memory();
        let status = check_driver_freshness(
            &resources,
            &root,
            &mut store,
            &mut RecordingSink::default(),
        )
        .unwrap();

        let DriverStatus::Updated { backup_dir } = status else {
            panic!("expected an update");
        };
        assert_eq!(
            fs::read_to_string(root.join("ff7.exe")).unwrap(),
            "new launcher"
        );
        assert_eq!(
            fs::read_to_string(root.join("FF7Config.exe")).unwrap(),
            "new config"
        );
        assert_eq!(
            fs::read_to_string(backup_dir.join("ff7.exe")).unwrap(),
            "old launcher"
        );
        assert!(!driver::launchers_differ(&resources, &root));
    }

    #[test]
    fn second_driver_update_gets_its_own_backup() {
        let dir = TempDir::new().unwrap();
        let resources = resources(dir.path());
        let root = dir.path().join("ff7");
        fs::create_dir_all(&root).unwrap();
        let first = backup::create_backup_dir(&root, Some("conversion")).unwrap();

        let mut store = FileStore::in_memory();
        let status = check_driver_freshness(
            &resources,
            &root,
            &mut store,
            &mut RecordingSink::default(),
        )
        .unwrap();
        let DriverStatus::Updated { backup_dir } = status else {
            panic!("expected an update");
        };
        assert_ne!(backup_dir, first);
        assert!(first.is_dir());
    }

    #[test]
    fn missing_folders_are_created_once() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("direct/battle")).unwrap();
        let mut sink = RecordingSink::default();

        let created = create_missing_folders(dir.path(), &mut sink);
        assert_eq!(created, MOD_FOLDERS.len() + DIRECT_SUBFOLDERS.len() - 1);
        assert!(dir.path().join("mods/7th Heaven").is_dir());
        assert!(dir.path().join("direct/world").is_dir());
        assert_eq!(sink.messages.len(), created);

        assert_eq!(create_missing_folders(dir.path(), &mut sink), 0);
    }
}
