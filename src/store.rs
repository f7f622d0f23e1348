use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

const EXPORT_HEADER: &str = "Windows Registry Editor Version 5.00";

/// Key/value persistence for installation records and compatibility settings.
/// Key paths use registry notation (`HKEY_...\Software\...`) and compare
/// case-insensitively, as do value names.
pub trait ConfigStore {
    fn get(&self, key: &str, value: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str, data: &str) -> Result<(), StoreError>;
    /// Writes the key and its subkeys to `dest`. Returns false when the key is absent.
    fn export_key(&self, key: &str, dest: &Path) -> Result<bool, StoreError>;
    fn import_key(&mut self, source: &Path) -> Result<(), StoreError>;
    fn delete_key(&mut self, key: &str) -> Result<(), StoreError>;
    fn delete_value(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn list_value_names(&self, key: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredKey {
    path: String,
    #[serde(default)]
    values: BTreeMap<String, StoredValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    name: String,
    data: String,
}

/// JSON-file backed store. Without a path it lives in memory only.
#[derive(Debug, Default)]
pub struct FileStore {
    path: Option<PathBuf>,
    keys: BTreeMap<String, StoredKey>,
}

impl FileStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let keys = if path.exists() {
            let raw = fs::read_to_string(path)?;
            let list: Vec<StoredKey> = serde_json::from_str(&raw)?;
            list.into_iter()
                .map(|key| (normalize(&key.path), key))
                .collect()
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            keys,
        })
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let list: Vec<&StoredKey> = self.keys.values().collect();
        let raw = serde_json::to_string_pretty(&list)?;
        let temp = path.with_extension("json.tmp");
        fs::write(&temp, raw)?;
        fs::rename(&temp, path)?;
        Ok(())
    }

    fn subtree(&self, key: &str) -> Vec<&StoredKey> {
        let normalized = normalize(key);
        let prefix = format!("{normalized}\\");
        self.keys
            .iter()
            .filter(|(path, _)| **path == normalized || path.starts_with(&prefix))
            .map(|(_, key)| key)
            .collect()
    }

    fn insert(&mut self, key: &str, value: &str, data: &str) {
        let entry = self
            .keys
            .entry(normalize(key))
            .or_insert_with(|| StoredKey {
                path: key.trim_end_matches('\\').to_string(),
                values: BTreeMap::new(),
            });
        entry.values.insert(
            value.to_lowercase(),
            StoredValue {
                name: value.to_string(),
                data: data.to_string(),
            },
        );
    }
}

impl ConfigStore for FileStore {
    fn get(&self, key: &str, value: &str) -> Option<String> {
        self.keys
            .get(&normalize(key))?
            .values
            .get(&value.to_lowercase())
            .map(|stored| stored.data.clone())
    }

    fn set(&mut self, key: &str, value: &str, data: &str) -> Result<(), StoreError> {
        self.insert(key, value, data);
        self.save()
    }

    fn export_key(&self, key: &str, dest: &Path) -> Result<bool, StoreError> {
        let keys = self.subtree(key);
        if keys.is_empty() {
            return Ok(false);
        }
        let mut out = String::from(EXPORT_HEADER);
        out.push_str("\r\n");
        for stored in keys {
            out.push_str(&format!("\r\n[{}]\r\n", stored.path));
            for value in stored.values.values() {
                out.push_str(&format!(
                    "\"{}\"=\"{}\"\r\n",
                    escape(&value.name),
                    escape(&value.data)
                ));
            }
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, out)?;
        Ok(true)
    }

    fn import_key(&mut self, source: &Path) -> Result<(), StoreError> {
        let raw = fs::read_to_string(source)?;
        let malformed = |reason: &str| StoreError::Export {
            path: source.to_path_buf(),
            reason: reason.to_string(),
        };
        let mut lines = raw.lines().map(str::trim).filter(|line| !line.is_empty());
        if lines.next() != Some(EXPORT_HEADER) {
            return Err(malformed("missing header"));
        }
        let mut current: Option<String> = None;
        for line in lines {
            if let Some(path) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                self.keys
                    .entry(normalize(path))
                    .or_insert_with(|| StoredKey {
                        path: path.to_string(),
                        values: BTreeMap::new(),
                    });
                current = Some(path.to_string());
                continue;
            }
            let key = current.as_deref().ok_or_else(|| malformed("value before key"))?;
            let (name, data) = parse_value_line(line).ok_or_else(|| malformed(line))?;
            let key = key.to_string();
            self.insert(&key, &name, &data);
        }
        self.save()
    }

    fn delete_key(&mut self, key: &str) -> Result<(), StoreError> {
        let normalized = normalize(key);
        let prefix = format!("{normalized}\\");
        let before = self.keys.len();
        self.keys
            .retain(|path, _| *path != normalized && !path.starts_with(&prefix));
        if self.keys.len() != before {
            self.save()?;
        }
        Ok(())
    }

    fn delete_value(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let removed = self
            .keys
            .get_mut(&normalize(key))
            .and_then(|stored| stored.values.remove(&value.to_lowercase()))
            .is_some();
        if removed {
            self.save()?;
        }
        Ok(())
    }

    fn list_value_names(&self, key: &str) -> Vec<String> {
        self.keys
            .get(&normalize(key))
            .map(|stored| stored.values.values().map(|v| v.name.clone()).collect())
            .unwrap_or_default()
    }
}

fn normalize(key: &str) -> String {
    key.trim_end_matches('\\').to_lowercase()
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

fn parse_value_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix('"')?;
    let (name, rest) = split_quoted(rest)?;
    let rest = rest.strip_prefix("=\"")?;
    let (data, tail) = split_quoted(rest)?;
    if !tail.is_empty() {
        return None;
    }
    Some((name, data))
}

/// Reads up to the closing quote, unescaping along the way.
fn split_quoted(raw: &str) -> Option<(String, &str)> {
    let mut out = String::new();
    let mut chars = raw.char_indices();
    while let Some((index, ch)) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?.1),
            '"' => return Some((out, &raw[index + 1..])),
            other => out.push(other),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KEY: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\Square Soft, Inc.\Final Fantasy VII";

    #[test]
    fn lookups_ignore_case() {
        let mut store = FileStore::in_memory();
        store.set(KEY, "AppPath", r"C:\Games\FF7\").unwrap();
        assert_eq!(
            store.get(&KEY.to_uppercase(), "apppath").as_deref(),
            Some(r"C:\Games\FF7\")
        );
        assert_eq!(store.list_value_names(KEY), vec!["AppPath".to_string()]);
    }

    #[test]
    fn export_of_missing_key_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_memory();
        let written = store.export_key(KEY, &dir.path().join("a.reg")).unwrap();
        assert!(!written);
        assert!(!dir.path().join("a.reg").exists());
    }

    #[test]
    fn export_then_import_restores_subtree() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("FF7-03.reg");
        let mut store = FileStore::in_memory();
        store.set(KEY, "Path", r#"C:\Games\"FF7""#).unwrap();
        store
            .set(&format!(r"{KEY}\GameConverterkeys"), "DataDrive", "D:")
            .unwrap();

        assert!(store.export_key(KEY, &dest).unwrap());
        store.delete_key(KEY).unwrap();
        assert!(store.get(KEY, "Path").is_none());
        assert!(store
            .get(&format!(r"{KEY}\GameConverterkeys"), "DataDrive")
            .is_none());

        store.import_key(&dest).unwrap();
        assert_eq!(store.get(KEY, "Path").as_deref(), Some(r#"C:\Games\"FF7""#));
        assert_eq!(
            store
                .get(&format!(r"{KEY}\GameConverterkeys"), "DataDrive")
                .as_deref(),
            Some("D:")
        );
    }

    #[test]
    fn file_store_persists_between_opens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        {
            let mut store = FileStore::open(&path).unwrap();
            store.set(KEY, "Path", "/games/ff7").unwrap();
            store.delete_value(KEY, "Missing").unwrap();
        }
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(KEY, "Path").as_deref(), Some("/games/ff7"));
    }

    #[test]
    fn delete_value_only_touches_named_value() {
        let mut store = FileStore::in_memory();
        store.set(KEY, "a", "1").unwrap();
        store.set(KEY, "b", "2").unwrap();
        store.delete_value(KEY, "A").unwrap();
        assert_eq!(store.list_value_names(KEY), vec!["b".to_string()]);
    }

    #[test]
    fn import_rejects_file_without_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.reg");
        fs::write(&path, "[HKEY_CURRENT_USER\\x]\r\n").unwrap();
        let mut store = FileStore::in_memory();
        assert!(matches!(
            store.import_key(&path),
            Err(StoreError::Export { .. })
        ));
    }
}
