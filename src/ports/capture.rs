use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::domain::{CaptureRequest, DeviceHandle, DomainError};

/// Chunks pushed by the backend while recording.
///
/// The stream ends once the backend has flushed its last chunk after `stop`.
/// An `Err` item means the device was lost mid-recording.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, DomainError>>;

/// Port for camera/microphone capture.
///
/// Implementations wrap a platform capture API. The session layer drives it
/// and owns the returned `DeviceHandle` until it hands it back via `release`.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request access to the devices named in `request`.
    ///
    /// Fails with `DeviceUnavailable` when permission is denied or no
    /// matching hardware exists. Never retried internally.
    async fn acquire(&self, request: CaptureRequest) -> Result<DeviceHandle, DomainError>;

    /// Begin producing chunks from an acquired device.
    async fn record(&self, handle: &DeviceHandle) -> Result<ChunkStream, DomainError>;

    /// Stop producing chunks. Any chunk still buffered by the backend is
    /// delivered on the stream before it ends.
    async fn stop(&self, handle: &DeviceHandle) -> Result<(), DomainError>;

    /// Release every track behind the handle.
    ///
    /// Synchronous so it can run from `Drop` when a session is torn down.
    fn release(&self, handle: DeviceHandle);
}
