use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Tables behind the unauthorized-copy heuristic. Kept as data so they can be
/// tuned from `rules.json` without touching the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionRules {
    /// Root subfolders never scanned (legitimate mod and patch folders).
    pub skip_folders: Vec<String>,
    /// Exact file names that are always allowed.
    pub allowed_files: Vec<String>,
    /// Entries whose path contains both substrings are allowed.
    pub allowed_pairs: Vec<(String, String)>,
    /// Exact file names of known cracking tools.
    pub tool_names: Vec<String>,
    /// Extensions, including the leading dot.
    pub extensions: Vec<String>,
    pub keywords: Vec<String>,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            skip_folders: strings(&["The_Reunion", "mods", "direct"]),
            allowed_files: strings(&["00422 [F - Crackling fire, looped].ogg"]),
            allowed_pairs: vec![("torrent".to_string(), "reunion".to_string())],
            tool_names: strings(&["ali213.ini", "rld.dll", "gameservices.dll"]),
            extensions: strings(&[".nfo"]),
            keywords: strings(&["crack", "warez", "torrent", "skidrow", "goodies"]),
        }
    }
}

impl DetectionRules {
    /// Reads `path` when it exists, otherwise the built-in tables.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|path| path.exists()) else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path).context("read detection rules")?;
        let rules = serde_json::from_str(&raw).context("parse detection rules")?;
        Ok(rules)
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let rules = DetectionRules::load_or_default(Some(&dir.path().join("rules.json"))).unwrap();
        assert_eq!(rules, DetectionRules::default());
        assert_eq!(DetectionRules::load_or_default(None).unwrap(), rules);
    }

    #[test]
    fn custom_tables_replace_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        let mut rules = DetectionRules::default();
        rules.keywords = vec!["fitgirl".to_string()];
        fs::write(&path, serde_json::to_string(&rules).unwrap()).unwrap();

        let loaded = DetectionRules::load_or_default(Some(&path)).unwrap();
        assert_eq!(loaded.keywords, vec!["fitgirl".to_string()]);
        assert_eq!(loaded.tool_names, DetectionRules::default().tool_names);
    }
}
