use crate::domain::capture::CaptureStatus;
use crate::domain::wizard::FieldError;
use thiserror::Error;

/// Domain-level errors for PromptVision.
///
/// None of these are retried automatically. Every failure is surfaced to the
/// caller, which decides whether to re-acquire, edit and resubmit, or retry.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    /// Camera or microphone permission denied, or hardware missing.
    #[error("Capture device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Invalid capture state transition from {from:?} to {to:?}")]
    CaptureStateTransition { from: CaptureStatus, to: CaptureStatus },

    #[error("Not currently recording")]
    NotRecording,

    #[error("Capture is not stopped (status: {0:?})")]
    CaptureNotStopped(CaptureStatus),

    #[error("Invalid configuration: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    /// User input rejected at entry, before any state changes.
    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("A generation request is already in flight")]
    SubmissionInFlight,

    #[error("No generated artifact available")]
    NoArtifact,

    /// Transport failure: connection refused, timeout, unreadable body.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("Server error ({status}): {reason}")]
    Server { status: u16, reason: String },

    #[error("Download failed: {0}")]
    Download(String),
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DomainError {
    /// Message shown to the user when this error ends a generation request.
    pub fn reason(&self) -> String {
        match self {
            DomainError::Server { reason, .. } => reason.clone(),
            DomainError::Validation(errors) => join_fields(errors),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
