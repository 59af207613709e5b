pub mod artifact;
pub mod capture;
pub mod config;
pub mod error;
pub mod generation;
pub mod wizard;

pub use artifact::{Artifact, ArtifactRef, ChunkBuffer, VoiceSample};
pub use capture::{
    AtomicCaptureStatus, CaptureDevice, CaptureEvent, CaptureRequest, CaptureStatus, DeviceHandle,
};
pub use config::AppConfig;
pub use error::DomainError;
pub use generation::{DownloadStatus, GenerationStatus, MultipartForm, ResultStatus};
pub use wizard::{DetailLevel, Field, FieldError, Language, Music, TopicSource, Voice, WizardConfig};
