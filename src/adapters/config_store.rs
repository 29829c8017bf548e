use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

const APP_DIR: &str = "voxrelay";
const CONFIG_FILE: &str = "config.toml";

/// TOML file store for [`AppConfig`].
pub struct TomlConfigStore {
    data_dir: PathBuf,
}

impl TomlConfigStore {
    /// Store under the per-user config directory.
    /// - Linux: ~/.config/voxrelay/
    /// - macOS: ~/Library/Application Support/voxrelay/
    /// - Windows: %APPDATA%\voxrelay\
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .ok_or_else(|| DomainError::Config("Could not find a config directory".to_string()))?;
        Self::at(data_dir)
    }

    /// Store rooted at `dir`, created if missing.
    pub fn at(dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let data_dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;

        info!(data_dir = ?data_dir, "ConfigStore initialized");
        Ok(Self { data_dir })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, "Configuration loaded");
            Ok(config)
        } else {
            info!(path = ?config_path, "Configuration file not found, creating default");
            let config = AppConfig::new();
            self.save(&config)?;
            Ok(config)
        }
    }

    fn save(&self, config: &AppConfig) -> Result<(), DomainError> {
        let config_path = self.config_path();
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&config_path, content)?;

        info!(path = ?config_path, "Configuration saved");
        Ok(())
    }

    fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        dirs::data_local_dir()
            .map(|p| p.join(APP_DIR).join("logs"))
            .filter(|_| self.is_default_location())
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }
}

impl TomlConfigStore {
    fn is_default_location(&self) -> bool {
        dirs::config_dir().is_some_and(|p| p.join(APP_DIR) == self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::at(dir.path()).unwrap();
        assert!(!store.config_path().exists());

        let config = store.load().unwrap();
        assert_eq!(config.audio.sample_rate, 16_000);
        assert!(store.config_path().exists());
        assert!(store.config_path().ends_with("config.toml"));
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::at(dir.path().join("nested")).unwrap();

        let mut config = AppConfig::new();
        config.logging.level = "debug".to_string();
        config.chunking.max_chunk_bytes = 4 * 1024 * 1024;
        config.backends.default_backend = Some("deepgram".to_string());
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.logging.level, "debug");
        assert_eq!(loaded.chunking.max_chunk_bytes, 4 * 1024 * 1024);
        assert_eq!(loaded.backends.default_backend.as_deref(), Some("deepgram"));
    }

    #[test]
    fn test_custom_root_keeps_logs_inside() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::at(dir.path()).unwrap();
        assert_eq!(store.logs_dir(), dir.path().join("logs"));
        assert_eq!(store.data_dir(), dir.path());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::at(dir.path()).unwrap();
        fs::write(store.config_path(), "[chunking\nmax_chunk_bytes = ").unwrap();

        match store.load() {
            Err(DomainError::Config(_)) => {}
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_load_effective_validates() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlConfigStore::at(dir.path()).unwrap();
        fs::write(store.config_path(), "[audio]\nchannels = 2\n").unwrap();
        assert!(store.load_effective().is_err());
    }
}
