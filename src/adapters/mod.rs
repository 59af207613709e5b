pub mod config_store;
pub mod cpal_capture;
pub mod file_sink;
pub mod http_client;

pub use config_store::TomlConfigStore;
pub use cpal_capture::CpalCaptureBackend;
pub use file_sink::FileArtifactSink;
pub use http_client::ReqwestHttpClient;
