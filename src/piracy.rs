use crate::rules::DetectionRules;
use std::{fs, path::Path};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Heuristic check for an unauthorized copy. Read-only; stops at the first hit.
pub fn is_pirated(root: &Path, rules: &DetectionRules) -> bool {
    let Ok(entries) = fs::read_dir(root) else {
        return false;
    };

    let mut folders = Vec::new();
    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            folders.push(path);
        } else {
            files.push(path);
        }
    }
    folders.sort();
    files.sort();

    for folder in folders {
        let name = folder
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        if contains_ignore_case(&rules.skip_folders, &name) {
            debug!(folder = %folder.display(), "skipping allow-listed folder");
            continue;
        }
        if folder_has_flagged_entry(root, &folder, rules) {
            return true;
        }
    }

    files.iter().any(|file| {
        let flagged = is_flagged(root, file, rules);
        if flagged {
            warn!(path = %file.display(), "install entry flagged as illegitimate");
        }
        flagged
    })
}

fn folder_has_flagged_entry(root: &Path, folder: &Path, rules: &DetectionRules) -> bool {
    for entry in WalkDir::new(folder).min_depth(1).sort_by_file_name() {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if contains_ignore_case(&rules.allowed_files, &name) {
            continue;
        }
        let relative = relative_lower(root, path);
        if rules.allowed_pairs.iter().any(|(first, second)| {
            relative.contains(&first.to_lowercase()) && relative.contains(&second.to_lowercase())
        }) {
            continue;
        }
        if is_flagged(root, path, rules) {
            warn!(path = %path.display(), "install entry flagged as illegitimate");
            return true;
        }
    }
    false
}

/// Per-entry classifier: tool name, then extension, then path keyword.
pub fn is_flagged(root: &Path, path: &Path, rules: &DetectionRules) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    if contains_ignore_case(&rules.tool_names, &name) {
        return true;
    }

    if let Some(ext) = path.extension() {
        let ext = format!(".{}", ext.to_string_lossy());
        if contains_ignore_case(&rules.extensions, &ext) {
            return true;
        }
    }

    let relative = relative_lower(root, path);
    rules
        .keywords
        .iter()
        .any(|keyword| relative.contains(&keyword.to_lowercase()))
}

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|item| item.eq_ignore_ascii_case(value))
}

/// Keywords are matched below the install root so parent folder names
/// outside the game never count.
fn relative_lower(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn clean_install_is_legitimate() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "ff7.exe");
        touch(dir.path(), "data/field/flevel.lgp");
        assert!(!is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn tool_name_at_root_is_flagged() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "RLD.dll");
        assert!(is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn tool_name_without_keyword_is_flagged_in_subfolder() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/gameservices.dll");
        let mut rules = DetectionRules::default();
        rules.keywords.clear();
        assert!(is_pirated(dir.path(), &rules));
    }

    #[test]
    fn extension_is_flagged() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "data/readme.NFO");
        assert!(is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn keyword_in_folder_name_is_flagged() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "SkidRow/setup.ini");
        assert!(is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn allow_listed_folders_are_not_scanned() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "mods/crack/rld.dll");
        touch(dir.path(), "THE_REUNION/warez.nfo");
        assert!(!is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn allowed_file_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "music/00422 [F - Crackling fire, looped].ogg");
        assert!(!is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn reunion_torrent_metadata_is_allowed() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "patches/Reunion R06.torrent");
        assert!(!is_pirated(dir.path(), &DetectionRules::default()));
        touch(dir.path(), "patches/other.torrent");
        assert!(is_pirated(dir.path(), &DetectionRules::default()));
    }

    #[test]
    fn parent_folders_outside_root_do_not_count() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("goodies").join("ff7");
        touch(&root, "data/field/flevel.lgp");
        assert!(!is_pirated(&root, &DetectionRules::default()));
    }

    #[test]
    fn missing_root_is_not_flagged() {
        let dir = TempDir::new().unwrap();
        assert!(!is_pirated(&dir.path().join("nope"), &DetectionRules::default()));
    }
}
