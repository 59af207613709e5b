use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Media capture state machine.
///
/// State transitions:
/// - Idle -> Acquiring (acquire, device granted)
/// - Idle -> Error (acquire, device denied)
/// - Acquiring -> Recording (start)
/// - Recording -> Stopped (stop, device released)
/// - Stopped -> Acquiring -> Recording (start, device re-acquired)
/// - Error -> Acquiring (acquire, caller re-invokes)
///
/// The device handle is held exactly while the status is Acquiring or Recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CaptureStatus {
    /// No device held, nothing recorded.
    Idle = 0,
    /// Device granted and previewing, not yet recording.
    Acquiring = 1,
    /// Chunks are being buffered.
    Recording = 2,
    /// Recording finished and device released; chunks can be assembled.
    Stopped = 3,
    /// Acquisition or capture failed.
    Error = 4,
}

impl CaptureStatus {
    #[must_use]
    pub fn can_acquire(&self) -> bool {
        matches!(
            self,
            CaptureStatus::Idle | CaptureStatus::Stopped | CaptureStatus::Error
        )
    }

    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, CaptureStatus::Acquiring | CaptureStatus::Stopped)
    }

    #[must_use]
    pub fn can_stop(&self) -> bool {
        matches!(self, CaptureStatus::Recording)
    }

    /// Whether a device handle is held in this state.
    #[must_use]
    pub fn holds_device(&self) -> bool {
        matches!(self, CaptureStatus::Acquiring | CaptureStatus::Recording)
    }
}

impl From<u8> for CaptureStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => CaptureStatus::Idle,
            1 => CaptureStatus::Acquiring,
            2 => CaptureStatus::Recording,
            3 => CaptureStatus::Stopped,
            _ => CaptureStatus::Error,
        }
    }
}

impl From<CaptureStatus> for u8 {
    fn from(status: CaptureStatus) -> Self {
        status as u8
    }
}

/// Atomic wrapper for CaptureStatus, shared with the timer and chunk tasks.
#[derive(Debug)]
pub struct AtomicCaptureStatus(AtomicU8);

impl AtomicCaptureStatus {
    pub fn new(status: CaptureStatus) -> Self {
        Self(AtomicU8::new(status.into()))
    }

    pub fn load(&self) -> CaptureStatus {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, status: CaptureStatus) {
        self.0.store(status.into(), Ordering::Release);
    }
}

impl Default for AtomicCaptureStatus {
    fn default() -> Self {
        Self::new(CaptureStatus::Idle)
    }
}

/// Which tracks to request from the capture backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub audio: bool,
    pub video: bool,
}

impl CaptureRequest {
    pub fn new(audio: bool, video: bool) -> Self {
        Self { audio, video }
    }

    pub fn audio_only() -> Self {
        Self::new(true, false)
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video
    }
}

/// Live handle to acquired capture hardware.
///
/// Deliberately not `Clone`: the session owns it exclusively and gives it back
/// to the backend through `CaptureBackend::release`, which consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct DeviceHandle {
    id: u64,
    request: CaptureRequest,
    media_type: String,
    label: String,
}

impl DeviceHandle {
    pub fn new(
        id: u64,
        request: CaptureRequest,
        media_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id,
            request,
            media_type: media_type.into(),
            label: label.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn request(&self) -> CaptureRequest {
        self.request
    }

    /// Media type of the chunks this device produces.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Human-readable device name, used for the preview and logs.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Events emitted by a capture session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CaptureEvent {
    StateChanged {
        from: CaptureStatus,
        to: CaptureStatus,
    },
    /// Whole seconds elapsed since recording started.
    Tick { elapsed_secs: u64 },
    ChunkBuffered { bytes: usize },
    Error { message: String },
}

/// Input device information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureDevice {
    /// Unique device identifier.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the system default device.
    pub is_default: bool,
}
