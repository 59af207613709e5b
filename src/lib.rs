#![forbid(unsafe_code)]

//! PromptVision client core: configure an explanatory video, record voice
//! samples, submit the generation request and fetch the rendered result.

pub mod adapters;
pub mod app;
pub mod domain;
pub mod infrastructure;
pub mod ports;

pub use app::{
    AppController, GenerationPipeline, MediaCaptureSession, ResultRetriever, Session,
    SubmitOutcome, WizardForm,
};
pub use domain::{
    Artifact, ArtifactRef, CaptureStatus, DomainError, GenerationStatus, ResultStatus,
    WizardConfig,
};
