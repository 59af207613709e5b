pub mod capture;
pub mod config;
pub mod http;
pub mod sink;

pub use capture::{CaptureBackend, ChunkStream};
pub use config::ConfigStore;
pub use http::{HttpClient, HttpResponse};
pub use sink::ArtifactSink;
