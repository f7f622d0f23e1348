use crate::{
    fs_utils,
    game,
    manifest::{BackupManifest, EntryKind, BACKUP_FOLDER_NAME, HELPER_LIBRARY_PATTERN, LAUNCHER_FILES},
    store::ConfigStore,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, info};
use walkdir::WalkDir;

const META_FILE: &str = "meta.json";
const LAST_FILE: &str = "last.json";
const MAX_NAME_ATTEMPTS: usize = 1000;

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupMeta {
    pub timestamp: i64,
    pub reason: Option<String>,
    pub install_root: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
struct LastBackup {
    path: PathBuf,
    timestamp: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct RestoreReport {
    pub files_restored: usize,
    pub keys_imported: usize,
}

/// Creates a fresh `Backup_<yyyyMMddHHmmss>` directory under the install's
/// backup folder. Never reuses a directory: same-second collisions get a
/// numeric suffix.
pub fn create_backup_dir(install_root: &Path, reason: Option<&str>) -> Result<PathBuf> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let stamp = now
        .format(format_description!(
            "[year][month][day][hour][minute][second]"
        ))
        .context("format backup timestamp")?;
    let backup_root = install_root.join(BACKUP_FOLDER_NAME);
    fs::create_dir_all(&backup_root).context("create backups dir")?;

    let mut backup_dir = None;
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("Backup_{stamp}")
        } else {
            format!("Backup_{stamp}_{attempt}")
        };
        let candidate = backup_root.join(name);
        match fs::create_dir(&candidate) {
            Ok(()) => {
                backup_dir = Some(candidate);
                break;
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                debug!(path = %candidate.display(), "backup dir taken, trying next name");
            }
            Err(err) => {
                return Err(err).with_context(|| format!("create backup dir {:?}", candidate))
            }
        }
    }
    let Some(backup_dir) = backup_dir else {
        bail!("no free backup dir name under {:?}", backup_root);
    };

    let meta = BackupMeta {
        timestamp: now.unix_timestamp(),
        reason: reason.map(|value| value.to_string()),
        install_root: install_root.to_path_buf(),
    };
    let meta_json = serde_json::to_string_pretty(&meta).context("serialize backup meta")?;
    fs::write(backup_dir.join(META_FILE), meta_json).context("write backup meta")?;

    let last = LastBackup {
        path: backup_dir.clone(),
        timestamp: meta.timestamp,
    };
    let last_json = serde_json::to_string_pretty(&last).context("serialize last backup")?;
    fs::write(backup_root.join(LAST_FILE), last_json).context("write last backup")?;

    info!(path = %backup_dir.display(), "created backup dir");
    Ok(backup_dir)
}

/// Exports the installation keys to `.reg` files in `destination`.
/// Absent keys are skipped. A failed export aborts, since later stages delete
/// some of these keys.
pub fn backup_configuration(store: &dyn ConfigStore, destination: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(destination).context("create backup dir")?;
    let mut written = Vec::new();
    for (key, file_name) in game::backup_keys(store) {
        let dest = destination.join(file_name);
        if store
            .export_key(key, &dest)
            .with_context(|| format!("export {key}"))?
        {
            written.push(dest);
        } else {
            debug!(key, "config key absent, nothing to export");
        }
    }
    Ok(written)
}

/// Moves every existing manifest entry, plus helper-library files, from
/// `install_root` into the same relative place under `destination`.
/// Missing entries are skipped; any I/O error aborts.
pub fn relocate_manifest(
    manifest: &BackupManifest,
    install_root: &Path,
    destination: &Path,
) -> Result<usize> {
    fs::create_dir_all(destination).context("create backup dir")?;
    let mut moved = 0;
    for entry in manifest.entries {
        let Some(source) =
            fs_utils::resolve_ignore_case(install_root, Path::new(entry.relative_path))
        else {
            continue;
        };
        let relative = source
            .strip_prefix(install_root)
            .context("strip install prefix")?;
        let dest = destination.join(relative);
        match entry.kind {
            EntryKind::File if source.is_file() => fs_utils::move_file(&source, &dest)?,
            EntryKind::Folder if source.is_dir() => fs_utils::move_dir_recursive(&source, &dest)?,
            _ => continue,
        }
        debug!(entry = entry.relative_path, "moved into backup");
        moved += 1;
    }

    for source in fs_utils::matching_files(install_root, HELPER_LIBRARY_PATTERN)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        fs_utils::move_file(&source, &destination.join(name))?;
        moved += 1;
    }
    debug!(manifest = manifest.version, moved, "manifest relocated");
    Ok(moved)
}

/// Copies the installed launcher pair into `destination`.
pub fn backup_launchers(install_root: &Path, destination: &Path) -> Result<usize> {
    fs::create_dir_all(destination).context("create backup dir")?;
    let mut copied = 0;
    for name in LAUNCHER_FILES {
        let source = install_root.join(name);
        if source.is_file() {
            fs::copy(&source, destination.join(name))
                .with_context(|| format!("back up {:?}", source))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Backup directories of an install, newest first. Ordered by the `meta.json`
/// timestamp, then by the same-second suffix.
pub fn list_backups(install_root: &Path) -> Result<Vec<PathBuf>> {
    let backup_root = install_root.join(BACKUP_FOLDER_NAME);
    if !backup_root.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(&backup_root).context("read backups dir")? {
        let entry = entry.context("read backups dir")?;
        let path = entry.path();
        let is_backup = entry
            .file_name()
            .to_string_lossy()
            .starts_with("Backup_");
        if is_backup && path.is_dir() {
            dirs.push(path);
        }
    }
    let mut keyed: Vec<_> = dirs
        .into_iter()
        .map(|path| {
            let timestamp = load_backup_meta(&path).ok().map(|meta| meta.timestamp);
            (timestamp, name_suffix(&path), path)
        })
        .collect();
    keyed.sort();
    Ok(keyed.into_iter().rev().map(|(_, _, path)| path).collect())
}

/// The `_N` collision suffix of a backup dir name; 0 for the first of a second.
fn name_suffix(path: &Path) -> u32 {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_prefix("Backup_"))
        .and_then(|rest| rest.split_once('_'))
        .and_then(|(_, suffix)| suffix.parse().ok())
        .unwrap_or(0)
}

pub fn load_last_backup(install_root: &Path) -> Result<Option<PathBuf>> {
    let path = install_root.join(BACKUP_FOLDER_NAME).join(LAST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path).context("read last backup")?;
    let last: LastBackup = serde_json::from_str(&raw).context("parse last backup")?;
    if last.path.exists() {
        Ok(Some(last.path))
    } else {
        Ok(None)
    }
}

pub fn load_backup_meta(backup_dir: &Path) -> Result<BackupMeta> {
    let raw = fs::read_to_string(backup_dir.join(META_FILE)).context("read backup meta")?;
    let meta = serde_json::from_str(&raw).context("parse backup meta")?;
    Ok(meta)
}

/// Puts a backup back: exported keys are re-imported and every relocated
/// file is moved back to its place under `install_root`, replacing what the
/// conversion installed.
pub fn restore_backup(
    backup_dir: &Path,
    install_root: &Path,
    store: &mut dyn ConfigStore,
) -> Result<RestoreReport> {
    if !backup_dir.is_dir() {
        bail!("backup dir {:?} does not exist", backup_dir);
    }
    let mut report = RestoreReport::default();
    let files: Vec<PathBuf> = WalkDir::new(backup_dir)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();

    for file in files {
        let relative = file
            .strip_prefix(backup_dir)
            .context("strip backup prefix")?
            .to_path_buf();
        let top_level = relative.components().count() == 1;
        let name = relative.to_string_lossy().to_string();
        if top_level && name == META_FILE {
            continue;
        }
        if top_level && name.to_lowercase().ends_with(".reg") {
            store
                .import_key(&file)
                .with_context(|| format!("import {:?}", file))?;
            report.keys_imported += 1;
            continue;
        }
        let dest = install_root.join(&relative);
        fs_utils::remove_file_if_exists(&dest).with_context(|| format!("replace {:?}", dest))?;
        fs_utils::move_file(&file, &dest)?;
        report.files_restored += 1;
    }
    info!(
        backup = %backup_dir.display(),
        files = report.files_restored,
        keys = report.keys_imported,
        "restored backup"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        game::{FF7_APP_KEY, OLD_CONVERTER_KEY},
        manifest::{CURRENT_APP, LEGACY_CONVERTER},
        store::FileStore,
    };
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn backup_dirs_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let first = create_backup_dir(dir.path(), Some("convert")).unwrap();
        let second = create_backup_dir(dir.path(), Some("driver")).unwrap();
        assert_ne!(first, second);
        assert!(first.is_dir() && second.is_dir());
        assert_eq!(load_last_backup(dir.path()).unwrap(), Some(second.clone()));
        assert_eq!(
            load_backup_meta(&first).unwrap().reason.as_deref(),
            Some("convert")
        );
        assert_eq!(list_backups(dir.path()).unwrap()[0], second);
    }

    #[test]
    fn many_backups_in_one_second_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let backup_root = dir.path().join(BACKUP_FOLDER_NAME);
        for suffix in ["", "_2", "_10", "_1"] {
            let backup = backup_root.join(format!("Backup_20240101120000{suffix}"));
            fs::create_dir_all(&backup).unwrap();
            let meta = BackupMeta {
                timestamp: 1_704_110_400,
                reason: None,
                install_root: dir.path().to_path_buf(),
            };
            fs::write(backup.join(META_FILE), serde_json::to_string(&meta).unwrap()).unwrap();
        }
        let older = backup_root.join("Backup_20231231235959");
        fs::create_dir_all(&older).unwrap();

        let names: Vec<_> = list_backups(dir.path())
            .unwrap()
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "Backup_20240101120000_10",
                "Backup_20240101120000_2",
                "Backup_20240101120000_1",
                "Backup_20240101120000",
                "Backup_20231231235959",
            ]
        );
    }

    #[test]
    fn relocation_moves_existing_entries_with_content() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ff7");
        let dest = dir.path().join("backup");
        write(&root.join("ff7.exe"), "old exe");
        write(&root.join("plugins/ff7music.fgp"), "plugin");
        write(&root.join("Hext_in/patch.txt"), "hext");
        write(&root.join("EasyHook64.dll"), "hook");
        write(&root.join("data/field/flevel.lgp"), "keep");

        let moved = relocate_manifest(&CURRENT_APP, &root, &dest).unwrap()
            + relocate_manifest(&LEGACY_CONVERTER, &root, &dest).unwrap();
        assert_eq!(moved, 4);

        for relative in ["ff7.exe", "plugins/ff7music.fgp", "Hext_in/patch.txt", "EasyHook64.dll"] {
            assert!(!root.join(relative).exists(), "{relative} left behind");
            assert!(dest.join(relative).is_file(), "{relative} not in backup");
        }
        assert_eq!(fs::read_to_string(dest.join("ff7.exe")).unwrap(), "old exe");
        assert_eq!(fs::read_to_string(dest.join("Hext_in/patch.txt")).unwrap(), "hext");
        assert!(root.join("data/field/flevel.lgp").is_file());
    }

    #[test]
    fn relocation_of_empty_install_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ff7");
        fs::create_dir_all(&root).unwrap();
        assert_eq!(
            relocate_manifest(&CURRENT_APP, &root, &dir.path().join("b")).unwrap(),
            0
        );
    }

    #[test]
    fn configuration_backup_skips_absent_keys() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::in_memory();
        store.set(FF7_APP_KEY, "Path", "/games/ff7").unwrap();

        let written = backup_configuration(&store, dir.path()).unwrap();
        assert_eq!(written.len(), 1);
        assert!(dir.path().join("FF7-03.reg").is_file());
        assert!(!dir.path().join("FF7-01.reg").exists());

        store.set(OLD_CONVERTER_KEY, "Drive", "D:").unwrap();
        let written = backup_configuration(&store, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("FF7-OldGC.reg").is_file());
    }

    #[test]
    fn restore_puts_files_and_keys_back() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ff7");
        write(&root.join("ff7.exe"), "old exe");
        let mut store = FileStore::in_memory();
        store.set(OLD_CONVERTER_KEY, "Drive", "D:").unwrap();

        let backup = create_backup_dir(&root, None).unwrap();
        backup_configuration(&store, &backup).unwrap();
        relocate_manifest(&CURRENT_APP, &root, &backup).unwrap();
        store.delete_key(OLD_CONVERTER_KEY).unwrap();
        write(&root.join("ff7.exe"), "new exe");

        let report = restore_backup(&backup, &root, &mut store).unwrap();
        assert_eq!(report.files_restored, 1);
        assert!(report.keys_imported >= 1);
        assert_eq!(fs::read_to_string(root.join("ff7.exe")).unwrap(), "old exe");
        assert_eq!(store.get(OLD_CONVERTER_KEY, "Drive").as_deref(), Some("D:"));
    }

    #[test]
    fn launcher_backup_copies_without_moving() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("ff7");
        write(&root.join("ff7.exe"), "exe");
        let dest = dir.path().join("b");
        assert_eq!(backup_launchers(&root, &dest).unwrap(), 1);
        assert!(root.join("ff7.exe").is_file());
        assert!(dest.join("ff7.exe").is_file());
    }
}
