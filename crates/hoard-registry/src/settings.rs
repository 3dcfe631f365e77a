use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, RegistryResult};

/// Manager settings, usually read from `hoard.toml`.
///
/// ```toml
/// data_dir = "/var/lib/hoard"
/// config_file = "blob-stores.json"
/// log_filter = "hoard=debug"
/// ```
///
/// Every field is optional.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Base directory for relative `file.path` attributes and the config file.
    pub data_dir: PathBuf,
    /// Persisted configuration file, relative to `data_dir` unless absolute.
    pub config_file: PathBuf,
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./hoard-data"),
            config_file: PathBuf::from("blob-stores.json"),
            log_filter: "info".to_string(),
        }
    }
}

impl ManagerSettings {
    /// Settings rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> RegistryResult<Self> {
        toml::from_str(raw).map_err(|e| RegistryError::Settings(e.to_string()))
    }

    /// Read settings from a TOML file.
    pub fn load(path: &Path) -> RegistryResult<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| RegistryError::Settings(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Where persisted configurations live.
    pub fn config_path(&self) -> PathBuf {
        if self.config_file.is_absolute() {
            self.config_file.clone()
        } else {
            self.data_dir.join(&self.config_file)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(
            ManagerSettings::from_toml_str("").unwrap(),
            ManagerSettings::default()
        );
    }

    #[test]
    fn partial_toml() {
        let settings = ManagerSettings::from_toml_str("data_dir = \"/srv/hoard\"\n").unwrap();
        assert_eq!(settings.data_dir, PathBuf::from("/srv/hoard"));
        assert_eq!(settings.log_filter, "info");
        assert_eq!(
            settings.config_path(),
            PathBuf::from("/srv/hoard/blob-stores.json")
        );
    }

    #[test]
    fn absolute_config_file_wins() {
        let settings = ManagerSettings {
            config_file: PathBuf::from("/etc/hoard/stores.json"),
            ..ManagerSettings::with_data_dir("/srv/hoard")
        };
        assert_eq!(settings.config_path(), PathBuf::from("/etc/hoard/stores.json"));
    }

    #[test]
    fn bad_toml_is_settings_error() {
        assert!(matches!(
            ManagerSettings::from_toml_str("data_dir = ["),
            Err(RegistryError::Settings(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hoard.toml");
        fs::write(&path, "log_filter = \"hoard=debug\"\n").unwrap();
        let settings = ManagerSettings::load(&path).unwrap();
        assert_eq!(settings.log_filter, "hoard=debug");
        assert!(ManagerSettings::load(&dir.path().join("missing.toml")).is_err());
    }
}
