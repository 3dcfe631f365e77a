//! Persisted blob store configurations.
//!
//! The registry saves every configuration it registers through a
//! [`ConfigStore`] and removes it again on delete. Two implementations are
//! provided: [`InMemoryConfigStore`] for tests and embedding, and
//! [`JsonFileConfigStore`], which keeps a pretty-printed JSON array on disk.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use hoard_types::BlobStoreConfiguration;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// Storage port for blob store configurations, keyed by store name.
pub trait ConfigStore: Send + Sync {
    /// Every persisted configuration, sorted by name.
    fn load_all(&self) -> RegistryResult<Vec<BlobStoreConfiguration>>;

    /// Insert or replace the configuration stored under `config.name`.
    fn save(&self, config: &BlobStoreConfiguration) -> RegistryResult<()>;

    /// Remove the configuration for `name`. Returns `true` if it existed.
    fn remove(&self, name: &str) -> RegistryResult<bool>;
}

// ---------------------------------------------------------------------------
// InMemoryConfigStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: Mutex<BTreeMap<String, BlobStoreConfiguration>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_all(&self) -> RegistryResult<Vec<BlobStoreConfiguration>> {
        let configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(configs.values().cloned().collect())
    }

    fn save(&self, config: &BlobStoreConfiguration) -> RegistryResult<()> {
        let mut configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        configs.insert(config.name.clone(), config.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> RegistryResult<bool> {
        let mut configs = self.configs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(configs.remove(name).is_some())
    }
}

// ---------------------------------------------------------------------------
// JsonFileConfigStore
// ---------------------------------------------------------------------------

/// Configurations as a JSON array in a single file.
///
/// Every mutation rewrites the whole file through a temporary file in the
/// same directory, so a crash leaves either the old or the new contents.
/// A missing file reads as empty.
#[derive(Debug)]
pub struct JsonFileConfigStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl JsonFileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RegistryResult<BTreeMap<String, BlobStoreConfiguration>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(RegistryError::Persistence(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        let configs: Vec<BlobStoreConfiguration> = serde_json::from_slice(&raw).map_err(|e| {
            RegistryError::Persistence(format!("parse {}: {e}", self.path.display()))
        })?;
        Ok(configs.into_iter().map(|c| (c.name.clone(), c)).collect())
    }

    fn write(&self, configs: &BTreeMap<String, BlobStoreConfiguration>) -> RegistryResult<()> {
        let persistence = |e: &dyn std::fmt::Display| {
            RegistryError::Persistence(format!("write {}: {e}", self.path.display()))
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| persistence(&e))?;

        let list: Vec<&BlobStoreConfiguration> = configs.values().collect();
        let json = serde_json::to_vec_pretty(&list).map_err(|e| persistence(&e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| persistence(&e))?;
        tmp.write_all(&json).map_err(|e| persistence(&e))?;
        tmp.as_file().sync_all().map_err(|e| persistence(&e))?;
        tmp.persist(&self.path).map_err(|e| persistence(&e.error))?;

        debug!(path = %self.path.display(), count = list.len(), "configurations written");
        Ok(())
    }
}

impl ConfigStore for JsonFileConfigStore {
    fn load_all(&self) -> RegistryResult<Vec<BlobStoreConfiguration>> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read()?.into_values().collect())
    }

    fn save(&self, config: &BlobStoreConfiguration) -> RegistryResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut configs = self.read()?;
        configs.insert(config.name.clone(), config.clone());
        self.write(&configs)
    }

    fn remove(&self, name: &str) -> RegistryResult<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut configs = self.read()?;
        if configs.remove(name).is_none() {
            return Ok(false);
        }
        self.write(&configs)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_types::GroupAttributes;

    fn memory_config(name: &str) -> BlobStoreConfiguration {
        BlobStoreConfiguration::new(name, "memory").with_attribute("memory", "volume", name)
    }

    #[test]
    fn in_memory_save_replace_remove() {
        let store = InMemoryConfigStore::new();
        store.save(&memory_config("b")).unwrap();
        store.save(&memory_config("a")).unwrap();
        store
            .save(&memory_config("a").with_attribute("custom", "k", "v"))
            .unwrap();

        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "a");
        assert_eq!(all[0].attribute("custom", "k"), Some("v"));

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn json_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileConfigStore::new(dir.path().join("stores.json"));
        assert!(store.load_all().unwrap().is_empty());
        assert!(!store.remove("x").unwrap());
    }

    #[test]
    fn json_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stores.json");
        let group = GroupAttributes::new(vec!["a".into(), "b".into()], "roundRobin")
            .into_configuration("g")
            .unwrap();
        {
            let store = JsonFileConfigStore::new(&path);
            store.save(&memory_config("a")).unwrap();
            store.save(&group).unwrap();
        }

        let reopened = JsonFileConfigStore::new(&path);
        let all = reopened.load_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1], group);
        assert_eq!(
            all[1].attribute(GroupAttributes::SECTION, GroupAttributes::MEMBERS_KEY),
            Some("a,b")
        );
    }

    #[test]
    fn json_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stores.json");
        fs::write(&path, b"{not json").unwrap();
        let store = JsonFileConfigStore::new(&path);
        assert!(matches!(
            store.load_all(),
            Err(RegistryError::Persistence(_))
        ));
    }
}
