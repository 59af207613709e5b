use std::path::PathBuf;

use crate::domain::{AppConfig, DomainError};

/// Port for loading and persisting `AppConfig`.
pub trait ConfigStore: Send + Sync {
    /// Load the stored configuration, writing defaults first if none exists.
    fn load(&self) -> Result<AppConfig, DomainError>;

    fn save(&self, config: &AppConfig) -> Result<(), DomainError>;

    fn config_path(&self) -> PathBuf;

    /// Application data directory.
    fn data_dir(&self) -> PathBuf;

    fn logs_dir(&self) -> PathBuf;
}
