use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::session::Session;
use crate::domain::generation::{
    build_form, extract_error_detail, generic_failure_reason, VideoLocation,
};
use crate::domain::{Artifact, ArtifactRef, DomainError, GenerationStatus, WizardConfig};
use crate::ports::{ArtifactSink, HttpClient, HttpResponse};

const DEFAULT_VIDEO_TYPE: &str = "video/mp4";

/// How a submission that reached the network ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed(ArtifactRef),
    /// The user left the view before the response arrived.
    Discarded,
}

#[derive(Default)]
struct PipelineState {
    status: GenerationStatus,
    artifact: Option<Artifact>,
}

/// Resets the pipeline to Idle if a submission is dropped before it settles.
struct InFlight<'a> {
    state: &'a Mutex<PipelineState>,
    settled: bool,
}

impl InFlight<'_> {
    fn set_status(&self, status: GenerationStatus) {
        self.state.lock().status = status;
    }

    fn settle(mut self, status: GenerationStatus, artifact: Option<Artifact>) {
        debug_assert!(status.is_terminal() || status == GenerationStatus::Idle);
        let mut state = self.state.lock();
        debug!(from = ?state.status, to = ?status, "Generation status changed");
        state.status = status;
        state.artifact = artifact;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let mut state = self.state.lock();
            if state.status.is_in_flight() {
                warn!("Submission abandoned before completion");
                state.status = GenerationStatus::Idle;
            }
        }
    }
}

/// Validates a wizard configuration and turns it into a generated video.
///
/// At most one request is in flight per pipeline. A response that arrives
/// after the session's view changed is dropped.
pub struct GenerationPipeline<H: HttpClient> {
    http: Arc<H>,
    endpoint: Url,
    session: Session,
    state: Mutex<PipelineState>,
}

impl<H: HttpClient> GenerationPipeline<H> {
    pub fn new(http: Arc<H>, endpoint: Url, session: Session) -> Self {
        Self {
            http,
            endpoint,
            session,
            state: Mutex::new(PipelineState::default()),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn status(&self) -> GenerationStatus {
        self.state.lock().status.clone()
    }

    /// The generated video, when the backend returned it inline.
    pub fn artifact(&self) -> Option<Artifact> {
        self.state.lock().artifact.clone()
    }

    /// Reference to hand to the results view after a success.
    pub fn result_ref(&self) -> Option<ArtifactRef> {
        match &self.state.lock().status {
            GenerationStatus::Success(reference) => Some(reference.clone()),
            _ => None,
        }
    }

    /// Validate `config`, submit it and wait for the rendered video.
    ///
    /// Errors leave the pipeline in `Failed(reason)`; a second call while
    /// one is running is rejected without touching the network.
    pub async fn submit(&self, config: &WizardConfig) -> Result<SubmitOutcome, DomainError> {
        {
            let mut state = self.state.lock();
            if state.status.is_in_flight() {
                warn!(session = %self.session.id(), "Submission already in flight");
                return Err(DomainError::SubmissionInFlight);
            }
            state.status = GenerationStatus::Validating;
            state.artifact = None;
        }
        let in_flight = InFlight {
            state: &self.state,
            settled: false,
        };
        let ticket = self.session.ticket();

        let form = match build_form(config) {
            Ok(form) => form,
            Err(errors) => {
                let err = DomainError::Validation(errors);
                info!(reason = %err.reason(), "Generation request rejected by validation");
                in_flight.settle(GenerationStatus::Failed(err.reason()), None);
                return Err(err);
            }
        };

        in_flight.set_status(GenerationStatus::Submitting);
        info!(session = %self.session.id(), url = %self.endpoint, "Submitting generation request");

        let result = match self.http.post_multipart(self.endpoint.as_str(), form).await {
            Ok(response) => self.interpret(response),
            Err(e) => Err(e),
        };

        if !self.session.is_current(ticket) {
            info!(session = %self.session.id(), "View changed during generation, discarding result");
            in_flight.settle(GenerationStatus::Idle, None);
            return Ok(SubmitOutcome::Discarded);
        }

        match result {
            Ok((reference, artifact)) => {
                info!(?reference, "Generation succeeded");
                in_flight.settle(GenerationStatus::Success(reference.clone()), artifact);
                Ok(SubmitOutcome::Completed(reference))
            }
            Err(e) => {
                warn!(error = %e, "Generation failed");
                in_flight.settle(GenerationStatus::Failed(e.reason()), None);
                Err(e)
            }
        }
    }

    fn interpret(
        &self,
        response: HttpResponse,
    ) -> Result<(ArtifactRef, Option<Artifact>), DomainError> {
        if !response.is_success() {
            let reason = extract_error_detail(&response.body)
                .unwrap_or_else(|| generic_failure_reason(response.status));
            return Err(DomainError::Server {
                status: response.status,
                reason,
            });
        }

        if response.is_json() {
            let location: VideoLocation = response.json()?;
            let url = self.endpoint.join(&location.video_url).map_err(|e| {
                DomainError::Server {
                    status: response.status,
                    reason: format!("Invalid video URL '{}': {}", location.video_url, e),
                }
            })?;
            return Ok((ArtifactRef::Remote { url: url.into() }, None));
        }

        if response.body.is_empty() {
            return Err(DomainError::Server {
                status: response.status,
                reason: "Server returned an empty video".to_string(),
            });
        }

        let media_type = response
            .content_type
            .unwrap_or_else(|| DEFAULT_VIDEO_TYPE.to_string());
        let artifact = Artifact::new(response.body, media_type);
        Ok((ArtifactRef::local(&artifact), Some(artifact)))
    }

    /// Save the inline video through `sink`.
    pub async fn save_artifact<S: ArtifactSink + ?Sized>(
        &self,
        sink: &S,
        filename: &str,
    ) -> Result<PathBuf, DomainError> {
        let artifact = self.artifact().ok_or(DomainError::NoArtifact)?;
        let path = sink.save(&artifact, filename).await?;
        info!(path = ?path, "Generated video saved");
        Ok(path)
    }

    /// Back to Idle so the form can be edited from scratch.
    pub fn reset(&self) -> Result<(), DomainError> {
        let mut state = self.state.lock();
        if state.status.is_in_flight() {
            return Err(DomainError::SubmissionInFlight);
        }
        *state = PipelineState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::adapters::{FileArtifactSink, ReqwestHttpClient};
    use crate::app::wizard::WizardForm;
    use crate::domain::{DetailLevel, TopicSource};

    fn valid_config() -> WizardConfig {
        WizardConfig {
            topic: TopicSource::Text("  Photosynthesis  ".to_string()),
            duration_minutes: Some(5),
            detail_level: Some(DetailLevel::WorldClass),
            ..WizardConfig::default()
        }
    }

    fn pipeline(server: &MockServer) -> GenerationPipeline<ReqwestHttpClient> {
        let http = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let endpoint = Url::parse(&format!("{}/generate-presentation", server.uri())).unwrap();
        GenerationPipeline::new(Arc::new(http), endpoint, Session::new())
    }

    async fn mount_video(server: &MockServer, bytes: &[u8], delay: Duration) {
        Mock::given(method("POST"))
            .and(path("/generate-presentation"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(bytes.to_vec(), "video/mp4")
                    .set_delay(delay),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_success_exposes_returned_bytes() {
        let server = MockServer::start().await;
        let bytes = b"\x00\x00\x00\x18ftypmp42 fake video".to_vec();
        mount_video(&server, &bytes, Duration::ZERO).await;

        let pipeline = pipeline(&server);
        let outcome = pipeline.submit(&valid_config()).await.unwrap();

        let artifact = pipeline.artifact().unwrap();
        assert_eq!(artifact.bytes(), bytes.as_slice());
        assert_eq!(artifact.media_type(), "video/mp4");
        assert!(matches!(pipeline.status(), GenerationStatus::Success(ArtifactRef::Local { .. })));
        assert_eq!(outcome, SubmitOutcome::Completed(pipeline.result_ref().unwrap()));
    }

    #[tokio::test]
    async fn test_structured_error_detail_becomes_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(serde_json::json!({"detail": "bad input"})),
            )
            .mount(&server)
            .await;

        let pipeline = pipeline(&server);
        let err = pipeline.submit(&valid_config()).await.unwrap_err();

        assert!(matches!(err, DomainError::Server { status: 422, .. }));
        assert_eq!(pipeline.status(), GenerationStatus::Failed("bad input".to_string()));
        assert!(pipeline.artifact().is_none());
    }

    #[tokio::test]
    async fn test_unstructured_error_uses_generic_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_raw("<html>oops</html>", "text/html"))
            .mount(&server)
            .await;

        let pipeline = pipeline(&server);
        assert!(pipeline.submit(&valid_config()).await.is_err());
        assert_eq!(
            pipeline.status(),
            GenerationStatus::Failed("Video generation failed (HTTP 500)".to_string())
        );
    }

    #[tokio::test]
    async fn test_invalid_config_issues_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let pipeline = pipeline(&server);
        let config = WizardConfig {
            duration_minutes: None,
            ..valid_config()
        };
        let err = pipeline.submit(&config).await.unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        match pipeline.status() {
            GenerationStatus::Failed(reason) => assert!(reason.contains("duration")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_double_submit_sends_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(b"video".to_vec(), "video/mp4")
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let pipeline = pipeline(&server);
        let config = valid_config();
        let (first, second) = tokio::join!(pipeline.submit(&config), pipeline.submit(&config));

        assert!(first.is_ok());
        assert!(matches!(second, Err(DomainError::SubmissionInFlight)));
        assert!(matches!(pipeline.status(), GenerationStatus::Success(_)));
    }

    #[tokio::test]
    async fn test_form_carries_all_fields() {
        let server = MockServer::start().await;
        mount_video(&server, b"video", Duration::ZERO).await;

        let pipeline = pipeline(&server);
        pipeline.submit(&valid_config()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        for field in ["text", "duration", "detail_level", "character", "language"] {
            assert!(body.contains(&format!("name=\"{}\"", field)), "missing {}", field);
        }
        assert!(!body.contains("name=\"file\""));
        assert!(body.contains("\r\n\r\nPhotosynthesis\r\n"));
        assert!(body.contains("World class"));
        assert!(body.contains("Default - Man"));
    }

    #[tokio::test]
    async fn test_latest_topic_source_is_submitted() {
        let server = MockServer::start().await;
        mount_video(&server, b"video", Duration::ZERO).await;

        let mut form = WizardForm::new();
        form.set_topic_text("typed first");
        form.set_topic_file("lesson.pdf", b"%PDF-1.4 body".to_vec());
        form.set_duration_input("4").unwrap();
        form.set_detail_level(DetailLevel::Intermediate);

        let pipeline = pipeline(&server);
        pipeline.submit(form.config()).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&requests[0].body).to_string();
        assert!(body.contains("name=\"file\""));
        assert!(body.contains("filename=\"lesson.pdf\""));
        assert!(body.to_lowercase().contains("content-type: application/pdf"));
        assert!(!body.contains("name=\"text\""));
        assert!(!body.contains("typed first"));
    }

    #[tokio::test]
    async fn test_json_video_url_resolves_to_remote_ref() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"video_url": "/videos/abc.mp4"})),
            )
            .mount(&server)
            .await;

        let pipeline = pipeline(&server);
        let outcome = pipeline.submit(&valid_config()).await.unwrap();

        let expected = format!("{}/videos/abc.mp4", server.uri());
        assert_eq!(
            outcome,
            SubmitOutcome::Completed(ArtifactRef::Remote { url: expected })
        );
        assert!(pipeline.artifact().is_none());
    }

    #[tokio::test]
    async fn test_response_after_leaving_view_is_discarded() {
        let server = MockServer::start().await;
        mount_video(&server, b"video", Duration::from_millis(200)).await;

        let pipeline = pipeline(&server);
        let session = pipeline.session().clone();
        let config = valid_config();
        let (outcome, _) = tokio::join!(pipeline.submit(&config), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            session.leave_view();
        });

        assert_eq!(outcome.unwrap(), SubmitOutcome::Discarded);
        assert_eq!(pipeline.status(), GenerationStatus::Idle);
        assert!(pipeline.artifact().is_none());
    }

    #[tokio::test]
    async fn test_dropped_submission_returns_to_idle() {
        let server = MockServer::start().await;
        mount_video(&server, b"video", Duration::from_millis(500)).await;

        let pipeline = pipeline(&server);
        let config = valid_config();
        let timed_out =
            tokio::time::timeout(Duration::from_millis(50), pipeline.submit(&config)).await;

        assert!(timed_out.is_err());
        assert_eq!(pipeline.status(), GenerationStatus::Idle);
    }

    #[tokio::test]
    async fn test_network_failure_is_surfaced() {
        let http = ReqwestHttpClient::new(Duration::from_secs(5)).unwrap();
        let endpoint = Url::parse("http://127.0.0.1:1/generate-presentation").unwrap();
        let pipeline = GenerationPipeline::new(Arc::new(http), endpoint, Session::new());

        let err = pipeline.submit(&valid_config()).await.unwrap_err();
        assert!(matches!(err, DomainError::Network(_)));
        assert!(matches!(pipeline.status(), GenerationStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_save_artifact_writes_video() {
        let server = MockServer::start().await;
        mount_video(&server, b"rendered", Duration::ZERO).await;
        let dir = tempfile::tempdir().unwrap();
        let sink = FileArtifactSink::new(dir.path());

        let pipeline = pipeline(&server);
        assert!(matches!(
            pipeline.save_artifact(&sink, "presentation-video.mp4").await,
            Err(DomainError::NoArtifact)
        ));

        pipeline.submit(&valid_config()).await.unwrap();
        let saved = pipeline
            .save_artifact(&sink, "presentation-video.mp4")
            .await
            .unwrap();
        assert_eq!(std::fs::read(saved).unwrap(), b"rendered");
    }

    #[tokio::test]
    async fn test_resubmit_after_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422).set_body_json(serde_json::json!({"detail": "bad input"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_video(&server, b"second try", Duration::ZERO).await;

        let pipeline = pipeline(&server);
        assert!(pipeline.submit(&valid_config()).await.is_err());
        assert!(pipeline.submit(&valid_config()).await.is_ok());
        assert_eq!(pipeline.artifact().unwrap().bytes(), b"second try");

        pipeline.reset().unwrap();
        assert_eq!(pipeline.status(), GenerationStatus::Idle);
        assert!(pipeline.artifact().is_none());
    }
}
