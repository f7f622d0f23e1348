use directories::BaseDirs;
use std::path::{Component, Path, PathBuf};

/// Folders an install must not live under (program files, the user profile,
/// the OS directory, or their Unix counterparts).
#[derive(Debug, Clone, Default)]
pub struct ProtectedLocations {
    prefixes: Vec<PathBuf>,
}

impl ProtectedLocations {
    pub fn new(prefixes: Vec<PathBuf>) -> Self {
        let prefixes = prefixes
            .into_iter()
            .filter(|prefix| !prefix.as_os_str().is_empty())
            .collect();
        Self { prefixes }
    }

    /// Platform defaults plus `extra`.
    pub fn for_platform(extra: &[PathBuf]) -> Self {
        let mut prefixes = platform_prefixes();
        prefixes.extend(extra.iter().cloned());
        Self::new(prefixes)
    }

    pub fn prefixes(&self) -> &[PathBuf] {
        &self.prefixes
    }

    /// True iff `root` exists and sits at or below a protected prefix.
    pub fn is_protected(&self, root: &Path) -> bool {
        if !root.exists() {
            return false;
        }
        self.prefixes
            .iter()
            .any(|prefix| path_starts_with(root, prefix))
    }
}

#[cfg(windows)]
fn platform_prefixes() -> Vec<PathBuf> {
    let mut prefixes: Vec<PathBuf> = ["ProgramFiles", "ProgramFiles(x86)", "windir"]
        .iter()
        .filter_map(std::env::var_os)
        .map(PathBuf::from)
        .collect();
    if let Some(base) = BaseDirs::new() {
        prefixes.push(base.home_dir().to_path_buf());
    }
    prefixes
}

#[cfg(not(windows))]
fn platform_prefixes() -> Vec<PathBuf> {
    let mut prefixes = vec![PathBuf::from("/usr"), PathBuf::from("/bin")];
    if let Some(base) = BaseDirs::new() {
        prefixes.push(base.home_dir().to_path_buf());
    }
    prefixes
}

fn path_starts_with(path: &Path, prefix: &Path) -> bool {
    let mut path_parts = path.components().filter(|c| *c != Component::CurDir);
    for expected in prefix.components().filter(|c| *c != Component::CurDir) {
        match path_parts.next() {
            Some(actual) if component_eq(actual, expected) => {}
            _ => return false,
        }
    }
    true
}

fn component_eq(left: Component<'_>, right: Component<'_>) -> bool {
    let left = left.as_os_str().to_string_lossy();
    let right = right.as_os_str().to_string_lossy();
    if cfg!(windows) {
        left.eq_ignore_ascii_case(&right)
    } else {
        left == right
    }
}
