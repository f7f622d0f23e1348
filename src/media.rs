use crate::fs_utils::find_child_ignore_case;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Resolves a removable-media volume label to where it is mounted.
pub trait MediaLocator {
    fn resolve_volume_label(&self, label: &str) -> Option<PathBuf>;
}

/// Looks for a directory named after the label under a set of mount roots
/// (`/media/$USER`, `/run/media/$USER`, ...). Static overrides win.
#[derive(Debug, Clone, Default)]
pub struct MountLocator {
    overrides: BTreeMap<String, PathBuf>,
    mount_roots: Vec<PathBuf>,
}

impl MountLocator {
    pub fn new(overrides: BTreeMap<String, PathBuf>, mount_roots: Vec<PathBuf>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(label, path)| (label.to_lowercase(), path))
            .collect();
        Self {
            overrides,
            mount_roots,
        }
    }
}

impl MediaLocator for MountLocator {
    fn resolve_volume_label(&self, label: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&label.to_lowercase()) {
            return path.is_dir().then(|| path.clone());
        }
        self.mount_roots
            .iter()
            .find_map(|root| find_child_ignore_case(root, label))
            .filter(|path| path.is_dir())
    }
}

pub fn default_mount_roots() -> Vec<PathBuf> {
    let mut roots = Vec::new();
    if let Some(user) = std::env::var_os("USER") {
        roots.push(Path::new("/media").join(&user));
        roots.push(Path::new("/run/media").join(&user));
    }
    roots.push(PathBuf::from("/media"));
    roots.push(PathBuf::from("/mnt"));
    roots
}

#[cfg(test)]
pub(crate) mod testing {
    use super::MediaLocator;
    use std::{cell::RefCell, collections::BTreeMap, path::PathBuf};

    /// Fixed label table that records every lookup.
    #[derive(Debug, Default)]
    pub struct FakeLocator {
        pub drives: BTreeMap<String, PathBuf>,
        pub lookups: RefCell<Vec<String>>,
    }

    impl FakeLocator {
        pub fn with(label: &str, path: PathBuf) -> Self {
            let mut locator = Self::default();
            locator.drives.insert(label.to_string(), path);
            locator
        }
    }

    impl MediaLocator for FakeLocator {
        fn resolve_volume_label(&self, label: &str) -> Option<PathBuf> {
            self.lookups.borrow_mut().push(label.to_string());
            self.drives.get(label).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn label_directory_under_mount_root_resolves() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("FF7DISC1")).unwrap();
        let locator = MountLocator::new(BTreeMap::new(), vec![dir.path().to_path_buf()]);
        assert_eq!(
            locator.resolve_volume_label("ff7disc1"),
            Some(dir.path().join("FF7DISC1"))
        );
        assert!(locator.resolve_volume_label("ff7disc2").is_none());
    }

    #[test]
    fn overrides_take_priority() {
        let dir = TempDir::new().unwrap();
        let mounted = dir.path().join("iso");
        fs::create_dir_all(&mounted).unwrap();
        fs::create_dir_all(dir.path().join("ff7install")).unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("FF7Install".to_string(), mounted.clone());
        let locator = MountLocator::new(overrides, vec![dir.path().to_path_buf()]);
        assert_eq!(locator.resolve_volume_label("ff7install"), Some(mounted));
    }
}
