use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::config::CaptureConfig;
use crate::domain::{
    Artifact, AtomicCaptureStatus, CaptureEvent, CaptureRequest, CaptureStatus, ChunkBuffer,
    DeviceHandle, DomainError, Language, VoiceSample,
};
use crate::ports::{CaptureBackend, ChunkStream};

const TICK: Duration = Duration::from_secs(1);
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// State shared between the session and its timer and chunk tasks.
struct Shared<B: CaptureBackend> {
    backend: Arc<B>,
    status: AtomicCaptureStatus,
    elapsed_secs: AtomicU64,
    device: Mutex<Option<DeviceHandle>>,
    chunks: Mutex<ChunkBuffer>,
    events: broadcast::Sender<CaptureEvent>,
}

impl<B: CaptureBackend> Shared<B> {
    fn transition(&self, to: CaptureStatus) {
        debug_assert!(
            to.holds_device() || self.device.lock().is_none(),
            "device still held entering {:?}",
            to
        );
        let from = self.status.load();
        self.status.store(to);
        if from != to {
            debug!(?from, ?to, "Capture status changed");
            let _ = self.events.send(CaptureEvent::StateChanged { from, to });
        }
    }

    /// Buffer a segment if the session is recording.
    ///
    /// The status check happens under the chunk lock so nothing slips in
    /// after `stop` has marked the session Stopped.
    fn append_chunk(&self, segment: Vec<u8>) -> bool {
        let mut chunks = self.chunks.lock();
        if self.status.load() != CaptureStatus::Recording {
            debug!(bytes = segment.len(), "Dropping chunk outside of recording");
            return false;
        }
        let bytes = segment.len();
        if !chunks.push(segment) {
            return false;
        }
        let _ = self.events.send(CaptureEvent::ChunkBuffered { bytes });
        true
    }

    /// Give the device back to the backend. Returns false if none was held.
    fn release_device(&self) -> bool {
        let Some(handle) = self.device.lock().take() else {
            return false;
        };
        info!(device = handle.label(), id = handle.id(), "Releasing capture device");
        self.backend.release(handle);
        true
    }

    fn fail(&self, message: String) {
        self.release_device();
        self.transition(CaptureStatus::Error);
        let _ = self.events.send(CaptureEvent::Error { message });
    }
}

/// Temporarily takes the device out of its slot for an awaited backend call
/// and always puts it back, even if the calling future is dropped.
struct DeviceLease<'a> {
    slot: &'a Mutex<Option<DeviceHandle>>,
    handle: Option<DeviceHandle>,
}

impl<'a> DeviceLease<'a> {
    fn take(slot: &'a Mutex<Option<DeviceHandle>>) -> Option<Self> {
        let handle = slot.lock().take()?;
        Some(Self {
            slot,
            handle: Some(handle),
        })
    }

    fn handle(&self) -> Option<&DeviceHandle> {
        self.handle.as_ref()
    }
}

impl Drop for DeviceLease<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            *self.slot.lock() = Some(handle);
        }
    }
}

/// One camera/microphone recording session.
///
/// Owns the device handle, the one-second timer, and the chunk buffer.
/// Dropping the session cancels both background tasks and releases the
/// device.
pub struct MediaCaptureSession<B: CaptureBackend + 'static> {
    shared: Arc<Shared<B>>,
    config: CaptureConfig,
    request: Option<CaptureRequest>,
    media_type: Option<String>,
    started_at: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    result: Option<Artifact>,
}

impl<B: CaptureBackend + 'static> MediaCaptureSession<B> {
    pub fn new(backend: Arc<B>, config: CaptureConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                backend,
                status: AtomicCaptureStatus::default(),
                elapsed_secs: AtomicU64::new(0),
                device: Mutex::new(None),
                chunks: Mutex::new(ChunkBuffer::new()),
                events,
            }),
            config,
            request: None,
            media_type: None,
            started_at: None,
            timer: None,
            pump: None,
            result: None,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.shared.status.load()
    }

    /// Whole seconds recorded so far.
    pub fn elapsed_secs(&self) -> u64 {
        self.shared.elapsed_secs.load(Ordering::Acquire)
    }

    /// When the current (or last) recording started.
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Media type declared by the device, once acquired.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// Label of the live device, for the preview.
    pub fn device_label(&self) -> Option<String> {
        self.shared
            .device
            .lock()
            .as_ref()
            .map(|h| h.label().to_string())
    }

    pub fn chunk_count(&self) -> usize {
        self.shared.chunks.lock().len()
    }

    /// Last artifact produced by `assemble`.
    pub fn result(&self) -> Option<&Artifact> {
        self.result.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.shared.events.subscribe()
    }

    /// Request camera and/or microphone access.
    ///
    /// On success the device is live for preview and the status is Acquiring.
    /// On failure the status is Error and the caller has to call again.
    pub async fn acquire(&mut self, want_audio: bool, want_video: bool) -> Result<(), DomainError> {
        let current = self.status();
        if !current.can_acquire() {
            return Err(DomainError::CaptureStateTransition {
                from: current,
                to: CaptureStatus::Acquiring,
            });
        }

        let request = CaptureRequest::new(want_audio, want_video);
        if request.is_empty() {
            return Err(DomainError::InvalidInput {
                field: "capture",
                message: "request at least one of audio or video".to_string(),
            });
        }
        self.request = Some(request);
        self.acquire_device(request).await
    }

    /// Acquire the tracks configured as defaults for the voice-sample screen.
    pub async fn acquire_default(&mut self) -> Result<(), DomainError> {
        self.acquire(self.config.want_audio, self.config.want_video).await
    }

    async fn acquire_device(&mut self, request: CaptureRequest) -> Result<(), DomainError> {
        match self.shared.backend.acquire(request).await {
            Ok(handle) => {
                info!(
                    device = handle.label(),
                    media_type = handle.media_type(),
                    audio = request.audio,
                    video = request.video,
                    "Capture device acquired"
                );
                self.media_type = Some(handle.media_type().to_string());
                *self.shared.device.lock() = Some(handle);
                self.shared.transition(CaptureStatus::Acquiring);
                Ok(())
            }
            Err(e) => {
                let message = match e {
                    DomainError::DeviceUnavailable { message } => message,
                    other => other.to_string(),
                };
                warn!(error = %message, "Capture device unavailable");
                self.shared.fail(message.clone());
                Err(DomainError::DeviceUnavailable { message })
            }
        }
    }

    /// Start recording.
    ///
    /// From Stopped the device is acquired again with the previous request.
    /// The elapsed counter restarts at zero and any earlier chunks are dropped.
    pub async fn start(&mut self) -> Result<(), DomainError> {
        let current = self.status();
        if !current.can_start() {
            return Err(DomainError::CaptureStateTransition {
                from: current,
                to: CaptureStatus::Recording,
            });
        }

        if current == CaptureStatus::Stopped {
            let request = self.request.unwrap_or_else(CaptureRequest::audio_only);
            self.acquire_device(request).await?;
        }

        let stream = {
            let lease = DeviceLease::take(&self.shared.device);
            let Some(handle) = lease.as_ref().and_then(DeviceLease::handle) else {
                return Err(DomainError::DeviceUnavailable {
                    message: "no device acquired".to_string(),
                });
            };
            self.shared.backend.record(handle).await
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                error!(error = %e, "Failed to start recording");
                self.shared.fail(e.to_string());
                return Err(e);
            }
        };

        self.cancel_tasks();
        self.shared.chunks.lock().clear();
        self.result = None;
        self.shared.elapsed_secs.store(0, Ordering::Release);
        self.started_at = Some(Instant::now());

        self.shared.transition(CaptureStatus::Recording);
        self.pump = Some(tokio::spawn(pump_chunks(Arc::clone(&self.shared), stream)));
        self.timer = Some(tokio::spawn(run_timer(Arc::clone(&self.shared))));

        info!("Recording started");
        Ok(())
    }

    /// Buffer a chunk produced by the backend.
    ///
    /// Zero-length segments and segments arriving outside Recording are
    /// ignored. Returns whether the segment was kept.
    pub fn append_chunk(&self, segment: Vec<u8>) -> bool {
        self.shared.append_chunk(segment)
    }

    /// Stop recording and release the device.
    ///
    /// The backend's trailing chunk is drained before the device goes away.
    /// Always ends in Stopped, even if the backend reports an error while
    /// stopping.
    pub async fn stop(&mut self) -> Result<(), DomainError> {
        let current = self.status();
        if !current.can_stop() {
            return Err(DomainError::NotRecording);
        }

        // The elapsed count freezes here, not after the flush wait.
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }

        let lease = DeviceLease::take(&self.shared.device);
        if let Some(handle) = lease.as_ref().and_then(DeviceLease::handle) {
            if let Err(e) = self.shared.backend.stop(handle).await {
                warn!(error = %e, "Backend reported an error while stopping");
            }
        }
        drop(lease);

        if let Some(pump) = self.pump.take() {
            let abort = pump.abort_handle();
            let flush_timeout = Duration::from_millis(self.config.flush_timeout_ms);
            if tokio::time::timeout(flush_timeout, pump).await.is_err() {
                warn!(
                    timeout_ms = self.config.flush_timeout_ms,
                    "Chunk stream did not end after stop, abandoning it"
                );
                abort.abort();
            }
        }
        self.cancel_tasks();
        self.shared.release_device();

        {
            let chunks = self.shared.chunks.lock();
            self.shared.transition(CaptureStatus::Stopped);
            info!(
                chunks = chunks.len(),
                bytes = chunks.byte_len(),
                elapsed_secs = self.elapsed_secs(),
                "Recording stopped"
            );
        }
        Ok(())
    }

    /// Concatenate the buffered chunks into one artifact.
    pub fn assemble(&mut self) -> Result<Artifact, DomainError> {
        let status = self.status();
        if status != CaptureStatus::Stopped {
            return Err(DomainError::CaptureNotStopped(status));
        }

        let data = self.shared.chunks.lock().concat();
        let media_type = self
            .media_type
            .clone()
            .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_string());
        let artifact = Artifact::new(data, media_type);
        debug!(
            bytes = artifact.len(),
            media_type = artifact.media_type(),
            "Recording assembled"
        );
        self.result = Some(artifact.clone());
        Ok(artifact)
    }

    /// Assemble the recording as a voice sample read in `language`.
    pub fn voice_sample(
        &mut self,
        language: Language,
        prompt_text: impl Into<String>,
    ) -> Result<VoiceSample, DomainError> {
        let artifact = self.assemble()?;
        Ok(VoiceSample {
            language,
            prompt_text: prompt_text.into(),
            artifact,
        })
    }

    /// Tear the session down: cancel tasks, release the device, drop chunks.
    pub fn close(&mut self) {
        self.teardown();
        self.shared.chunks.lock().clear();
        self.result = None;
        self.shared.transition(CaptureStatus::Idle);
    }

    fn cancel_tasks(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }

    fn teardown(&mut self) {
        self.cancel_tasks();
        if self.shared.release_device() {
            debug!("Capture device released on teardown");
        }
    }
}

impl<B: CaptureBackend + 'static> Drop for MediaCaptureSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn pump_chunks<B: CaptureBackend>(shared: Arc<Shared<B>>, mut stream: ChunkStream) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(segment) => {
                shared.append_chunk(segment);
            }
            Err(e) => {
                error!(error = %e, "Capture stream failed");
                shared.fail(e.to_string());
                return;
            }
        }
    }
    debug!("Chunk stream ended");
}

async fn run_timer<B: CaptureBackend>(shared: Arc<Shared<B>>) {
    let mut ticker = tokio::time::interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if shared.status.load() != CaptureStatus::Recording {
            break;
        }
        let elapsed_secs = shared.elapsed_secs.fetch_add(1, Ordering::AcqRel) + 1;
        let _ = shared.events.send(CaptureEvent::Tick { elapsed_secs });
    }
}
