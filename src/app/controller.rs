use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::{CpalCaptureBackend, FileArtifactSink, ReqwestHttpClient, TomlConfigStore};
use crate::app::capture_session::MediaCaptureSession;
use crate::app::pipeline::GenerationPipeline;
use crate::app::results::ResultRetriever;
use crate::app::session::Session;
use crate::app::wizard::WizardForm;
use crate::domain::{AppConfig, DomainError};
use crate::infrastructure::init_logging;
use crate::ports::ConfigStore;

/// Application controller: owns configuration and the shared adapters, and
/// hands out per-session components wired to them.
pub struct AppController {
    config: RwLock<AppConfig>,
    config_store: Arc<TomlConfigStore>,
    http: RwLock<Arc<ReqwestHttpClient>>,
    capture: Arc<CpalCaptureBackend>,
    _log_guard: Option<WorkerGuard>,
}

impl AppController {
    /// Initialize from the configuration in the OS config directory.
    pub fn new() -> Result<Self, DomainError> {
        Self::with_store(TomlConfigStore::new()?)
    }

    /// Initialize from an explicit store.
    /// Loads configuration, then sets up logging, HTTP and capture.
    pub fn with_store(config_store: TomlConfigStore) -> Result<Self, DomainError> {
        let config = config_store.load()?;

        let log_guard = init_logging(&config_store.logs_dir(), &config.logging)?;

        info!("PromptVision starting up");

        let http = Arc::new(Self::build_http(&config)?);
        let capture = Arc::new(CpalCaptureBackend::new(&config.capture)?);

        info!(base_url = %config.api.base_url, "AppController initialized");

        Ok(Self {
            config: RwLock::new(config),
            config_store: Arc::new(config_store),
            http: RwLock::new(http),
            capture,
            _log_guard: log_guard,
        })
    }

    fn build_http(config: &AppConfig) -> Result<ReqwestHttpClient, DomainError> {
        ReqwestHttpClient::new(Duration::from_secs(config.api.request_timeout_secs))
    }

    /// Get the current configuration.
    pub fn config(&self) -> AppConfig {
        self.config.read().clone()
    }

    /// Validate, persist and apply a new configuration.
    ///
    /// Components handed out earlier keep the settings they were built with.
    pub fn update_config(&self, config: AppConfig) -> Result<(), DomainError> {
        config.api.generate_url()?;
        config.api.result_url()?;
        let http = Arc::new(Self::build_http(&config)?);

        self.config_store.save(&config)?;

        *self.http.write() = http;
        *self.config.write() = config;

        info!("Configuration updated");
        Ok(())
    }

    pub fn new_session(&self) -> Session {
        let session = Session::new();
        info!(session = %session.id(), "Session started");
        session
    }

    pub fn wizard(&self) -> WizardForm {
        WizardForm::new()
    }

    /// Generation pipeline bound to `session`.
    pub fn pipeline(
        &self,
        session: &Session,
    ) -> Result<GenerationPipeline<ReqwestHttpClient>, DomainError> {
        let endpoint = self.config.read().api.generate_url()?;
        Ok(GenerationPipeline::new(
            self.http.read().clone(),
            endpoint,
            session.clone(),
        ))
    }

    pub fn retriever(&self) -> Result<ResultRetriever<ReqwestHttpClient>, DomainError> {
        let config = self.config.read();
        let lookup = config.api.result_url()?;
        Ok(ResultRetriever::new(
            self.http.read().clone(),
            lookup,
            config.output.video_filename.clone(),
        ))
    }

    /// A fresh capture session on the native audio backend.
    pub fn capture_session(&self) -> MediaCaptureSession<CpalCaptureBackend> {
        MediaCaptureSession::new(Arc::clone(&self.capture), self.config.read().capture.clone())
    }

    /// The native backend, for device listing and the input level meter.
    pub fn capture_backend(&self) -> &Arc<CpalCaptureBackend> {
        &self.capture
    }

    /// Where downloads and saved videos go.
    pub fn sink(&self) -> Result<FileArtifactSink, DomainError> {
        match &self.config.read().output.download_dir {
            Some(dir) => Ok(FileArtifactSink::new(dir.clone())),
            None => FileArtifactSink::downloads(),
        }
    }

    pub fn video_filename(&self) -> String {
        self.config.read().output.video_filename.clone()
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        self.config_store.data_dir()
    }

    /// Get the logs directory path.
    pub fn logs_dir(&self) -> PathBuf {
        self.config_store.logs_dir()
    }

    /// Get the config file path.
    pub fn config_path(&self) -> PathBuf {
        self.config_store.config_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CaptureStatus, GenerationStatus};

    fn controller(dir: &tempfile::TempDir) -> AppController {
        let store =
            TomlConfigStore::with_dirs(dir.path().join("data"), dir.path().join("logs")).unwrap();
        AppController::with_store(store).unwrap()
    }

    #[tokio::test]
    async fn test_controller_wires_components_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        assert!(controller.config_path().exists());
        assert_eq!(controller.video_filename(), "presentation-video.mp4");

        let session = controller.new_session();
        let pipeline = controller.pipeline(&session).unwrap();
        assert_eq!(pipeline.status(), GenerationStatus::Idle);
        assert_eq!(pipeline.session().id(), session.id());

        let capture = controller.capture_session();
        assert_eq!(capture.status(), CaptureStatus::Idle);

        assert_eq!(controller.wizard().validate().len(), 3);
    }

    #[tokio::test]
    async fn test_update_config_persists_and_rejects_bad_urls() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller(&dir);

        let mut config = controller.config();
        config.api.base_url = "https://render.example.com".to_string();
        config.output.download_dir = Some(dir.path().join("videos"));
        controller.update_config(config).unwrap();

        let reloaded = TomlConfigStore::with_dirs(dir.path().join("data"), dir.path().join("logs"))
            .unwrap()
            .load()
            .unwrap();
        assert_eq!(reloaded.api.base_url, "https://render.example.com");
        assert_eq!(controller.sink().unwrap().dir(), dir.path().join("videos"));

        let mut bad = controller.config();
        bad.api.base_url = "::not a url::".to_string();
        assert!(matches!(controller.update_config(bad), Err(DomainError::Config(_))));
        assert_eq!(controller.config().api.base_url, "https://render.example.com");
    }
}
