use std::fs;
use std::path::PathBuf;

use tracing::{debug, info};

use crate::domain::{AppConfig, DomainError};
use crate::ports::ConfigStore;

const APP_DIR: &str = "PromptVision";

/// TOML-based configuration store with OS-specific paths.
pub struct TomlConfigStore {
    data_dir: PathBuf,
    logs_dir: PathBuf,
}

impl TomlConfigStore {
    /// Create a store under the OS application data directory.
    /// - macOS: ~/Library/Application Support/PromptVision/
    /// - Windows: %APPDATA%\PromptVision\
    /// - Linux: ~/.config/PromptVision/
    pub fn new() -> Result<Self, DomainError> {
        let data_dir = dirs::config_dir()
            .map(|p| p.join(APP_DIR))
            .ok_or_else(|| {
                DomainError::Config("Could not find application data directory".to_string())
            })?;
        let logs_dir = dirs::data_local_dir()
            .map(|p| p.join(APP_DIR).join("logs"))
            .unwrap_or_else(|| data_dir.join("logs"));

        Self::with_dirs(data_dir, logs_dir)
    }

    /// Create a store rooted at explicit directories.
    pub fn with_dirs(data_dir: PathBuf, logs_dir: PathBuf) -> Result<Self, DomainError> {
        fs::create_dir_all(&data_dir)?;
        info!(data_dir = ?data_dir, "ConfigStore initialized");
        Ok(Self { data_dir, logs_dir })
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self) -> Result<AppConfig, DomainError> {
        let config_path = self.config_path();

        if config_path.exists() {
            debug!(path = ?config_path, "Loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: AppConfig = toml::from_str(&content)?;
            info!(path = ?config_path, base_url = %config.api.base_url, "Configuration loaded");
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
        self.data_dir.join("config.toml")
    }

    fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    fn logs_dir(&self) -> PathBuf {
        self.logs_dir.clone()
    }
}
