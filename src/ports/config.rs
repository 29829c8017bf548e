use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Persistent home of [`AppConfig`].
pub trait ConfigStore: Send + Sync {
    /// Load the stored configuration, creating a default file if none exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;

    /// Stored configuration with environment overrides applied, validated.
    fn load_effective(&self) -> Result<AppConfig, DomainError> {
        let mut config = self.load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}
