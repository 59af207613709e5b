use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::session::Session;
use crate::domain::generation::{extract_error_detail, VideoLocation};
use crate::domain::{Artifact, DomainError, DownloadStatus, ResultStatus};
use crate::ports::{ArtifactSink, HttpClient};

const FETCH_FAILED: &str = "Failed to fetch video";

/// Looks up the generated video for the results view and downloads it.
pub struct ResultRetriever<H: HttpClient> {
    http: Arc<H>,
    lookup: Url,
    filename: String,
    status: Mutex<ResultStatus>,
    download_status: Mutex<DownloadStatus>,
}

impl<H: HttpClient> ResultRetriever<H> {
    /// `filename` is the fixed name downloads are saved under.
    pub fn new(http: Arc<H>, lookup: Url, filename: impl Into<String>) -> Self {
        Self {
            http,
            lookup,
            filename: filename.into(),
            status: Mutex::new(ResultStatus::Idle),
            download_status: Mutex::new(DownloadStatus::Idle),
        }
    }

    pub fn status(&self) -> ResultStatus {
        self.status.lock().clone()
    }

    /// Outcome of the latest `download`.
    pub fn download_status(&self) -> DownloadStatus {
        self.download_status.lock().clone()
    }

    fn set_download_status(&self, status: DownloadStatus) {
        let mut current = self.download_status.lock();
        debug!(from = ?*current, to = ?status, "Download status changed");
        *current = status;
    }

    fn set_status(&self, status: ResultStatus) {
        let mut current = self.status.lock();
        debug!(from = ?*current, to = ?status, "Result status changed");
        *current = status;
    }

    /// Ask the backend where the session's video lives.
    ///
    /// Safe to call again after an error; each call starts from Loading.
    pub async fn fetch(&self, session: &Session) -> Result<String, DomainError> {
        self.set_status(ResultStatus::Loading);
        info!(session = %session.id(), url = %self.lookup, "Fetching generated video");

        match self.lookup_video_url().await {
            Ok(url) => {
                self.set_status(ResultStatus::Success(url.clone()));
                Ok(url)
            }
            Err(e) => {
                warn!(error = %e, "Video lookup failed");
                self.set_status(ResultStatus::Error(FETCH_FAILED.to_string()));
                Err(e)
            }
        }
    }

    async fn lookup_video_url(&self) -> Result<String, DomainError> {
        let response = self.http.get(self.lookup.as_str()).await?;
        if !response.is_success() {
            return Err(DomainError::Server {
                status: response.status,
                reason: extract_error_detail(&response.body)
                    .unwrap_or_else(|| FETCH_FAILED.to_string()),
            });
        }

        let location: VideoLocation = response.json()?;
        let url = self
            .lookup
            .join(&location.video_url)
            .map_err(|e| DomainError::Server {
                status: response.status,
                reason: format!("Invalid video URL '{}': {}", location.video_url, e),
            })?;
        Ok(url.into())
    }

    /// Download the video at `url` and save it under the fixed filename.
    ///
    /// Every failure comes back as `DomainError::Download` and is recorded in
    /// `download_status`; nothing is retried.
    pub async fn download<S: ArtifactSink + ?Sized>(
        &self,
        url: &str,
        sink: &S,
    ) -> Result<PathBuf, DomainError> {
        self.set_download_status(DownloadStatus::Downloading);
        info!(url = url, "Downloading generated video");

        match self.download_to(url, sink).await {
            Ok(path) => {
                self.set_download_status(DownloadStatus::Saved(path.clone()));
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, "Video download failed");
                self.set_download_status(DownloadStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn download_to<S: ArtifactSink + ?Sized>(
        &self,
        url: &str,
        sink: &S,
    ) -> Result<PathBuf, DomainError> {
        let response = self
            .http
            .get(url)
            .await
            .map_err(|e| DomainError::Download(e.to_string()))?;
        if !response.is_success() {
            return Err(DomainError::Download(format!(
                "Server returned HTTP {}",
                response.status
            )));
        }
        if response.body.is_empty() {
            return Err(DomainError::Download("Server returned an empty video".to_string()));
        }

        let media_type = response
            .content_type
            .unwrap_or_else(|| "video/mp4".to_string());
        let artifact = Artifact::new(response.body, media_type);

        let path = sink
            .save(&artifact, &self.filename)
            .await
            .map_err(|e| DomainError::Download(e.to_string()))?;
        info!(path = ?path, bytes = artifact.len(), "Video downloaded");
        Ok(path)
    }

    /// Download whatever the last successful fetch pointed at.
    pub async fn download_current<S: ArtifactSink + ?Sized>(
        &self,
        sink: &S,
    ) -> Result<PathBuf, DomainError> {
        let url = match self.status() {
            ResultStatus::Success(url) => url,
            _ => return Err(DomainError::NoArtifact),
        };
        self.download(&url, sink).await
    }
}
