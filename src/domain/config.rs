use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::error::DomainError;

/// Backend base URL baked in at build time, overridable in the config file.
pub const DEFAULT_API_BASE: &str = match option_env!("PROMPTVISION_API_BASE") {
    Some(base) => base,
    None => "http://localhost:8000",
};

/// Generation and result endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Multipart POST that renders a video.
    pub generate_path: String,
    /// GET returning `{videoUrl}` for the current session.
    pub result_path: String,
    /// Rendering is slow; requests are allowed to run this long.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            generate_path: "/generate-presentation".to_string(),
            result_path: "/api/get-generated-video".to_string(),
            request_timeout_secs: 600,
        }
    }
}

impl ApiConfig {
    /// Base URL with a trailing slash, so joins stay under its path.
    pub fn base(&self) -> Result<Url, DomainError> {
        let mut base = Url::parse(&self.base_url).map_err(|e| {
            DomainError::Config(format!("Invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    /// Absolute URL of `path` below the base path.
    pub fn endpoint(&self, path: &str) -> Result<Url, DomainError> {
        self.base()?
            .join(path.trim_start_matches('/'))
            .map_err(|e| DomainError::Config(format!("Invalid endpoint path '{}': {}", path, e)))
    }

    pub fn generate_url(&self) -> Result<Url, DomainError> {
        self.endpoint(&self.generate_path)
    }

    pub fn result_url(&self) -> Result<Url, DomainError> {
        self.endpoint(&self.result_path)
    }
}

/// Media capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target sample rate in Hz for recorded audio.
    pub sample_rate: u32,
    /// How long stop() waits for the backend to deliver its final chunk.
    pub flush_timeout_ms: u64,
    pub want_audio: bool,
    pub want_video: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            flush_timeout_ms: 2_000,
            want_audio: true,
            want_video: false,
        }
    }
}

/// Where saved videos go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Defaults to the OS download directory when unset.
    pub download_dir: Option<PathBuf>,
    pub video_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            video_filename: "presentation-video.mp4".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Enable file logging with rotation.
    pub file_logging: bool,
    /// Maximum number of log files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: true,
            max_files: 7,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub capture: CaptureConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new AppConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }
}
