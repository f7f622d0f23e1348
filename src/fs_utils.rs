use anyhow::{Context, Result};
use blake3::Hasher;
use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Copies everything below `source` into `dest`, overwriting files.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).with_context(|| format!("create {:?}", dest))?;
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.with_context(|| format!("walk {:?}", source))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("strip copy prefix")?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).with_context(|| format!("create {:?}", target))?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("copy {:?} -> {:?}", entry.path(), target))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Moves `source` to `dest`, merging into an existing tree when one is there.
pub fn move_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    if !dest.exists() {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
        }
        if fs::rename(source, dest).is_ok() {
            return Ok(());
        }
    }
    copy_dir_recursive(source, dest)?;
    fs::remove_dir_all(source).with_context(|| format!("remove {:?}", source))?;
    Ok(())
}

/// Moves a single file, falling back to copy and delete across filesystems.
pub fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }
    fs::copy(source, dest).with_context(|| format!("copy {:?} -> {:?}", source, dest))?;
    fs::remove_file(source).with_context(|| format!("remove {:?}", source))?;
    Ok(())
}

pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.is_file() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Files directly inside `dir` whose names match a shell-style `pattern`.
/// Matching ignores case, like the Windows file APIs the game ships for.
pub fn matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern).with_context(|| format!("pattern {pattern}"))?;
    let options = glob::MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let mut matches = Vec::new();
    if !dir.is_dir() {
        return Ok(matches);
    }
    for entry in fs::read_dir(dir).with_context(|| format!("read {:?}", dir))? {
        let entry = entry.with_context(|| format!("read {:?}", dir))?;
        if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        if pattern.matches_with(&name.to_string_lossy(), options) {
            matches.push(entry.path());
        }
    }
    matches.sort();
    Ok(matches)
}

/// Case-insensitive lookup of a single path component. Exact matches win.
pub fn find_child_ignore_case(parent: &Path, name: &str) -> Option<PathBuf> {
    let exact = parent.join(name);
    if exact.exists() {
        return Some(exact);
    }
    fs::read_dir(parent)
        .ok()?
        .flatten()
        .find(|entry| entry.file_name().to_string_lossy().eq_ignore_ascii_case(name))
        .map(|entry| entry.path())
}

/// Resolves `relative` under `root` one component at a time, ignoring case.
/// Optical media often carry upper-case names on case-sensitive hosts.
pub fn resolve_ignore_case(root: &Path, relative: &Path) -> Option<PathBuf> {
    let mut current = root.to_path_buf();
    for part in relative.components() {
        let name = part.as_os_str().to_string_lossy();
        current = find_child_ignore_case(&current, &name)?;
    }
    Some(current)
}

pub fn hash_file(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path).with_context(|| format!("open {:?}", path))?;
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize())
}

/// Content equality. A missing file on either side counts as different.
pub fn files_equal(left: &Path, right: &Path) -> bool {
    if !left.is_file() || !right.is_file() {
        return false;
    }
    match (fs::metadata(left), fs::metadata(right)) {
        (Ok(a), Ok(b)) if a.len() != b.len() => return false,
        (Err(_), _) | (_, Err(_)) => return false,
        _ => {}
    }
    match (hash_file(left), hash_file(right)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn copy_dir_recurses_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src");
        let dest = dir.path().join("dest");
        write(&source.join("a/b/c.txt"), "new");
        write(&dest.join("a/b/c.txt"), "old");
        fs::create_dir_all(source.join("empty")).unwrap();

        let copied = copy_dir_recursive(&source, &dest).unwrap();
        assert_eq!(copied, 1);
        assert_eq!(fs::read_to_string(dest.join("a/b/c.txt")).unwrap(), "new");
        assert!(dest.join("empty").is_dir());
    }

    #[test]
    fn move_dir_merges_into_existing_tree() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("music_ogg");
        let dest = dir.path().join("music/vgmstream");
        write(&source.join("tifa.ogg"), "tifa");
        write(&dest.join("aseri.ogg"), "aseri");

        move_dir_recursive(&source, &dest).unwrap();
        assert!(!source.exists());
        assert!(dest.join("tifa.ogg").is_file());
        assert!(dest.join("aseri.ogg").is_file());
    }

    #[test]
    fn matching_files_ignores_case_and_dirs() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("SMD.P"), "");
        write(&dir.path().join("s01d.p"), "");
        write(&dir.path().join("TMD.P"), "");
        fs::create_dir_all(dir.path().join("SXD.P")).unwrap();

        let found = matching_files(dir.path(), "S*D.P").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["SMD.P".to_string(), "s01d.p".to_string()]);
    }

    #[test]
    fn files_equal_compares_content() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        write(&a, "same");
        write(&b, "same");
        assert!(files_equal(&a, &b));
        write(&b, "diff");
        assert!(!files_equal(&a, &b));
        assert!(!files_equal(&a, &dir.path().join("missing")));
    }

    #[test]
    fn nested_lookup_ignores_case() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("FF7").join("MOVIES")).unwrap();
        fs::write(dir.path().join("FF7/MOVIES/OPENING.AVI"), b"avi").unwrap();
        assert_eq!(
            resolve_ignore_case(dir.path(), Path::new("ff7/movies/opening.avi")),
            Some(dir.path().join("FF7/MOVIES/OPENING.AVI"))
        );
        assert!(resolve_ignore_case(dir.path(), Path::new("ff7/movies/bike.avi")).is_none());
    }
}
