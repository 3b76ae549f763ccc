//! Aquabridge Settings
//!
//! A JSON settings file per service. Callers bring their own config type
//! and load, edit and save it through `Settings<T>`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

use aquabridge_keystore::default_config_dir_for;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Settings file {path} is invalid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, SettingsError>;

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> SettingsError + '_ {
    move |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A config value bound to the JSON file it was read from.
///
/// ```ignore
/// let settings: Settings<BridgeSettings> = Settings::load_or_default("aquabridge", None)?;
/// ```
pub struct Settings<T> {
    pub config: T,
    path: PathBuf,
}

impl<T> Settings<T> {
    pub fn new(config: T, path: PathBuf) -> Self {
        Self { config, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize + DeserializeOwned + Default> Settings<T> {
    /// Read `custom_path` (or the service's default location). A missing
    /// file is created with `T::default()`. Fields absent from the file take
    /// their defaults when `T` is `#[serde(default)]`.
    pub fn load_or_default(service: &str, custom_path: Option<&Path>) -> Result<Self> {
        let path = custom_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_settings_path(service));

        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Loading settings from {}", path.display());
                let config = serde_json::from_str(&content)
                    .map_err(|source| SettingsError::Parse { path: path.clone(), source })?;
                Ok(Self { config, path })
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings at {}, writing defaults", path.display());
                let settings = Self::new(T::default(), path);
                settings.save()?;
                Ok(settings)
            }
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    /// Persist through a sibling temp file renamed over the target.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let content =
            serde_json::to_vec_pretty(&self.config).map_err(|source| SettingsError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &self.path).map_err(io_err(&self.path))
    }

    pub fn update<F: FnOnce(&mut T)>(&mut self, f: F) -> Result<()> {
        f(&mut self.config);
        self.save()
    }
}

/// `<config dir>/settings.json` for `service`.
pub fn default_settings_path(service: &str) -> PathBuf {
    default_config_dir_for(service).join("settings.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize, Default, PartialEq)]
    #[serde(default)]
    struct TestConfig {
        network: String,
        ttl: u64,
    }

    #[test]
    fn test_settings_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        assert_eq!(settings.config, TestConfig::default());
        assert!(path.exists());

        let settings2: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        assert_eq!(settings2.config, TestConfig::default());
        assert_eq!(settings2.path(), path.as_path());
    }

    #[test]
    fn test_settings_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut settings: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        settings.config.network = "stage".to_string();
        settings.config.ttl = 20000;
        settings.save().unwrap();

        let loaded: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        assert_eq!(loaded.config.network, "stage");
        assert_eq!(loaded.config.ttl, 20000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(&path, r#"{"network":"testnet"}"#).unwrap();

        let loaded: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        assert_eq!(loaded.config.network, "testnet");
        assert_eq!(loaded.config.ttl, 0);
    }

    #[test]
    fn test_update_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("update.json");

        let mut settings = Settings::new(TestConfig::default(), path.clone());
        settings.update(|c| c.ttl = 1234).unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let loaded: Settings<TestConfig> =
            Settings::load_or_default("test", Some(&path)).unwrap();
        assert_eq!(loaded.config.ttl, 1234);
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let result: Result<Settings<TestConfig>> = Settings::load_or_default("test", Some(&path));
        assert!(matches!(result, Err(SettingsError::Parse { .. })));
    }

    #[test]
    fn test_default_settings_path() {
        let path = default_settings_path("aquabridge");
        assert!(path.ends_with("settings.json"));
    }
}
