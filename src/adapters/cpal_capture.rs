use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use futures_util::stream::{self, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::config::CaptureConfig;
use crate::domain::{CaptureDevice, CaptureRequest, DeviceHandle, DomainError};
use crate::ports::{CaptureBackend, ChunkStream};

type ChunkSender = mpsc::UnboundedSender<Result<Vec<u8>, DomainError>>;
type ChunkReceiver = mpsc::UnboundedReceiver<Result<Vec<u8>, DomainError>>;

/// Where the audio callback forwards chunks; empty while only previewing.
type ChunkSlot = Arc<Mutex<Option<ChunkSender>>>;

/// Commands sent to the audio thread.
enum CaptureCommand {
    Acquire {
        reply: oneshot::Sender<Result<(u64, String), DomainError>>,
    },
    Record {
        id: u64,
        reply: oneshot::Sender<Result<ChunkReceiver, DomainError>>,
    },
    Stop {
        id: u64,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Release {
        id: u64,
    },
    Shutdown,
}

/// An opened input stream, kept on the audio thread (cpal streams are not Send).
struct OpenDevice {
    stream: Stream,
    slot: ChunkSlot,
}

/// Media type of the PCM chunks this backend produces.
pub fn pcm_media_type(sample_rate: u32) -> String {
    format!("audio/L16;rate={};channels=1", sample_rate)
}

/// Audio processing utilities.
mod audio_processing {
    use super::*;

    pub fn get_device(selected_device_id: Option<&str>) -> Result<Device, DomainError> {
        let host = cpal::default_host();

        if let Some(id) = selected_device_id {
            let devices = host.input_devices().map_err(|e| DomainError::DeviceUnavailable {
                message: format!("Failed to enumerate devices: {}", e),
            })?;

            for device in devices {
                if let Ok(name) = device.name() {
                    if name == id {
                        return Ok(device);
                    }
                }
            }
            warn!(device_id = %id, "Selected device not found, falling back to default");
        }

        host.default_input_device()
            .ok_or_else(|| DomainError::DeviceUnavailable {
                message: "No default input device available".to_string(),
            })
    }

    pub fn build_stream(
        device: &Device,
        target_sample_rate: u32,
        slot: ChunkSlot,
        current_level: Arc<AtomicU32>,
    ) -> Result<Stream, DomainError> {
        let supported = device
            .default_input_config()
            .map_err(|e| DomainError::DeviceUnavailable {
                message: format!("Failed to get default config: {}", e),
            })?;
        let sample_format = supported.sample_format();
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        debug!(
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?sample_format,
            "Device default config"
        );

        let channels = config.channels as usize;
        let device_sample_rate = config.sample_rate.0;
        let err_slot = Arc::clone(&slot);
        let on_error = move |err: cpal::StreamError| {
            error!(?err, "Audio stream error");
            if let Some(tx) = err_slot.lock().as_ref() {
                let _ = tx.send(Err(DomainError::DeviceUnavailable {
                    message: format!("Input device lost: {}", err),
                }));
            }
        };

        let stream = match sample_format {
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    forward_samples(
                        data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &slot,
                        &current_level,
                    );
                },
                on_error,
                None,
            ),
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let i16_data: Vec<i16> = data
                        .iter()
                        .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                        .collect();
                    forward_samples(
                        &i16_data,
                        channels,
                        device_sample_rate,
                        target_sample_rate,
                        &slot,
                        &current_level,
                    );
                },
                on_error,
                None,
            ),
            _ => {
                return Err(DomainError::DeviceUnavailable {
                    message: format!("Unsupported sample format: {:?}", sample_format),
                });
            }
        }
        .map_err(|e| DomainError::DeviceUnavailable {
            message: format!("Failed to build stream: {}", e),
        })?;

        Ok(stream)
    }

    fn forward_samples(
        data: &[i16],
        channels: usize,
        device_sample_rate: u32,
        target_sample_rate: u32,
        slot: &ChunkSlot,
        current_level: &AtomicU32,
    ) {
        let mono = downmix(data, channels);
        let resampled = resample(&mono, device_sample_rate, target_sample_rate);

        let level = calculate_rms(&resampled);
        current_level.store(level.to_bits(), Ordering::Relaxed);

        if let Some(tx) = slot.lock().as_ref() {
            let _ = tx.send(Ok(to_le_bytes(&resampled)));
        }
    }

    pub fn downmix(data: &[i16], channels: usize) -> Vec<i16> {
        if channels > 1 {
            data.chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect()
        } else {
            data.to_vec()
        }
    }

    pub fn to_le_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    pub fn calculate_rms(samples: &[i16]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = samples.iter().map(|&s| (s as f64).powi(2)).sum();
        let rms = (sum_squares / samples.len() as f64).sqrt();
        (rms / 32767.0).min(1.0) as f32
    }

    pub fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
        if from_rate == to_rate || samples.is_empty() {
            return samples.to_vec();
        }

        let ratio = from_rate as f64 / to_rate as f64;
        let output_len = (samples.len() as f64 / ratio).ceil() as usize;
        let mut output = Vec::with_capacity(output_len);

        for i in 0..output_len {
            let src_pos = i as f64 * ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = src_pos.fract();

            let sample = if src_idx + 1 < samples.len() {
                let s0 = samples[src_idx] as f64;
                let s1 = samples[src_idx + 1] as f64;
                (s0 + (s1 - s0) * frac) as i16
            } else if src_idx < samples.len() {
                samples[src_idx]
            } else {
                0
            };
            output.push(sample);
        }
        output
    }
}

/// Drop the chunk sender, ending the receiver's stream after queued chunks.
fn close_slot(slot: &ChunkSlot) -> bool {
    slot.lock().take().is_some()
}

/// Audio thread runner. Streams are created, played and dropped here.
fn capture_thread_main(
    sample_rate: u32,
    selected_device_id: Arc<RwLock<Option<String>>>,
    current_level: Arc<AtomicU32>,
    mut cmd_rx: mpsc::UnboundedReceiver<CaptureCommand>,
) {
    let mut devices: HashMap<u64, OpenDevice> = HashMap::new();
    let mut next_id: u64 = 1;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Acquire { reply } => {
                let result = (|| -> Result<(u64, String), DomainError> {
                    let device_id = selected_device_id.read().clone();
                    let device = audio_processing::get_device(device_id.as_deref())?;
                    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

                    let slot: ChunkSlot = Arc::new(Mutex::new(None));
                    let stream = audio_processing::build_stream(
                        &device,
                        sample_rate,
                        Arc::clone(&slot),
                        Arc::clone(&current_level),
                    )?;
                    // Playing without a chunk sender drives the level meter only.
                    stream.play().map_err(|e| DomainError::DeviceUnavailable {
                        message: format!("Failed to start stream: {}", e),
                    })?;

                    let id = next_id;
                    next_id += 1;
                    devices.insert(id, OpenDevice { stream, slot });
                    info!(device = %device_name, id, "Input device opened");
                    Ok((id, device_name))
                })();
                let _ = reply.send(result);
            }
            CaptureCommand::Record { id, reply } => {
                let result = match devices.get(&id) {
                    Some(open) => {
                        let (tx, rx) = mpsc::unbounded_channel();
                        *open.slot.lock() = Some(tx);
                        Ok(rx)
                    }
                    None => Err(DomainError::DeviceUnavailable {
                        message: format!("Device {} is not open", id),
                    }),
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Stop { id, reply } => {
                let result = match devices.get(&id) {
                    Some(open) => {
                        // Pause first so the last callback buffer still finds
                        // a sender; dropping the sender then ends the stream
                        // once the receiver drains what is queued.
                        if let Err(e) = open.stream.pause() {
                            warn!(error = %e, "Failed to pause input stream");
                        }
                        close_slot(&open.slot);
                        Ok(())
                    }
                    None => Err(DomainError::NotRecording),
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Release { id } => {
                if let Some(open) = devices.remove(&id) {
                    close_slot(&open.slot);
                    drop(open.stream);
                    current_level.store(0f32.to_bits(), Ordering::Relaxed);
                    info!(id, "Input device released");
                }
            }
            CaptureCommand::Shutdown => {
                break;
            }
        }
    }
    devices.clear();
    debug!("Capture thread shutting down");
}

/// cpal-based microphone capture.
///
/// Uses a dedicated audio thread to handle the non-Send Stream type.
/// Produces 16-bit little-endian mono PCM; video is not supported.
pub struct CpalCaptureBackend {
    sample_rate: u32,
    current_level: Arc<AtomicU32>,
    selected_device_id: Arc<RwLock<Option<String>>>,
    cmd_tx: mpsc::UnboundedSender<CaptureCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalCaptureBackend {
    pub fn new(config: &CaptureConfig) -> Result<Self, DomainError> {
        let current_level = Arc::new(AtomicU32::new(0));
        let selected_device_id = Arc::new(RwLock::new(None));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let sample_rate = config.sample_rate;
        let thread_device_id = Arc::clone(&selected_device_id);
        let thread_level = Arc::clone(&current_level);

        let thread_handle = thread::Builder::new()
            .name("media-capture".to_string())
            .spawn(move || {
                capture_thread_main(sample_rate, thread_device_id, thread_level, cmd_rx)
            })
            .map_err(|e| DomainError::DeviceUnavailable {
                message: format!("Failed to spawn capture thread: {}", e),
            })?;

        info!(sample_rate, "CpalCaptureBackend initialized");

        Ok(Self {
            sample_rate,
            current_level,
            selected_device_id,
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    /// Current input level (0.0 - 1.0) while a device is open.
    pub fn current_level(&self) -> f32 {
        f32::from_bits(self.current_level.load(Ordering::Relaxed))
    }

    /// List available input devices with unique IDs.
    pub fn list_input_devices(&self) -> Result<Vec<CaptureDevice>, DomainError> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = host.input_devices().map_err(|e| DomainError::DeviceUnavailable {
            message: format!("Failed to enumerate devices: {}", e),
        })?;

        let mut result = Vec::new();
        let mut name_counts: HashMap<String, usize> = HashMap::new();

        for device in devices {
            if let Ok(name) = device.name() {
                // Duplicate names get an index suffix
                let count = name_counts.entry(name.clone()).or_insert(0);
                let id = if *count == 0 {
                    name.clone()
                } else {
                    format!("{}:{}", name, count)
                };
                *count += 1;

                result.push(CaptureDevice {
                    id,
                    is_default: Some(&name) == default_name.as_ref(),
                    name,
                });
            }
        }

        debug!(count = result.len(), "Listed input devices");
        Ok(result)
    }

    /// Select an input device by ID, or use the system default if None.
    pub fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        if let Some(id) = device_id {
            let devices = self.list_input_devices()?;
            if !devices.iter().any(|d| d.id == id) {
                return Err(DomainError::DeviceUnavailable {
                    message: format!("Device not found: {}", id),
                });
            }
        }

        *self.selected_device_id.write() = device_id.map(String::from);
        info!(device_id = ?device_id, "Input device selected");
        Ok(())
    }

    fn send(&self, cmd: CaptureCommand) -> Result<(), DomainError> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| DomainError::DeviceUnavailable {
                message: "Capture thread not running".to_string(),
            })
    }

    async fn wait<T>(reply: oneshot::Receiver<Result<T, DomainError>>) -> Result<T, DomainError> {
        reply.await.map_err(|_| DomainError::DeviceUnavailable {
            message: "Capture thread did not respond".to_string(),
        })?
    }
}

impl Drop for CpalCaptureBackend {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(CaptureCommand::Shutdown);

        if let Some(handle) = self.thread_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[async_trait]
impl CaptureBackend for CpalCaptureBackend {
    async fn acquire(&self, request: CaptureRequest) -> Result<DeviceHandle, DomainError> {
        if request.video {
            return Err(DomainError::DeviceUnavailable {
                message: "Camera capture is not available on this backend".to_string(),
            });
        }
        if !request.audio {
            return Err(DomainError::DeviceUnavailable {
                message: "No track requested".to_string(),
            });
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CaptureCommand::Acquire { reply: reply_tx })?;
        let (id, name) = Self::wait(reply_rx).await?;

        Ok(DeviceHandle::new(
            id,
            request,
            pcm_media_type(self.sample_rate),
            name,
        ))
    }

    async fn record(&self, handle: &DeviceHandle) -> Result<ChunkStream, DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CaptureCommand::Record {
            id: handle.id(),
            reply: reply_tx,
        })?;
        let rx = Self::wait(reply_rx).await?;

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed())
    }

    async fn stop(&self, handle: &DeviceHandle) -> Result<(), DomainError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(CaptureCommand::Stop {
            id: handle.id(),
            reply: reply_tx,
        })?;
        Self::wait(reply_rx).await
    }

    fn release(&self, handle: DeviceHandle) {
        if let Err(e) = self.send(CaptureCommand::Release { id: handle.id() }) {
            warn!(error = %e, id = handle.id(), "Could not release input device");
        }
    }
}
