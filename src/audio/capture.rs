//! Microphone capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal host/device/stream lifecycle.  Call
//! [`AudioCapture::start`] to begin streaming mono sample blocks over an
//! mpsc channel.  The returned [`StreamHandle`] is a RAII guard — dropping
//! it stops the underlying cpal stream.
//!
//! The processing thread wants a single mono stream at the device's native
//! rate, so the callback extracts the first channel from the interleaved
//! buffer and forwards it as-is; rate conversion happens per-frame further
//! down the pipeline.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("input device {0:?} not found")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value calls `cpal::Stream::drop` which pauses/stops the
/// underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture device wrapper built on top of `cpal`.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use mt63_rx::audio::AudioCapture;
///
/// let (tx, rx) = mpsc::channel::<Vec<f32>>();
/// let capture = AudioCapture::new(None).unwrap();
/// let _handle = capture.start(tx).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop capturing.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
}

impl AudioCapture {
    /// Create an [`AudioCapture`] on the named input device, or the system
    /// default when `device` is `None`.
    ///
    /// Queries the device's preferred stream configuration (sample rate,
    /// channels, buffer size) so no manual configuration is required.
    ///
    /// # Errors
    ///
    /// [`CaptureError::NoDevice`] when no input device is available,
    /// [`CaptureError::DeviceNotFound`] when the named device does not
    /// exist, or [`CaptureError::DefaultConfig`] when the device cannot
    /// report a default stream configuration.
    pub fn new(device: Option<&str>) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = match device {
            None => host.default_input_device().ok_or(CaptureError::NoDevice)?,
            Some(name) => host
                .input_devices()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound(name.to_string()))?,
        };

        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }

    /// Start capturing and send mono sample blocks to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each time the
    /// hardware delivers a buffer the first channel is extracted and
    /// forwarded over the channel.  Send errors (receiver dropped) are
    /// silently ignored so the audio thread never panics.
    ///
    /// # Errors
    ///
    /// [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`] if the
    /// platform rejects the stream configuration.
    pub fn start(&self, tx: mpsc::Sender<Vec<f32>>) -> Result<StreamHandle, CaptureError> {
        let channels = self.channels as usize;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let block: Vec<f32> = if channels <= 1 {
                    data.to_vec()
                } else {
                    data.iter().step_by(channels).copied().collect()
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(block);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Native sample rate of the capture stream in Hz.
    ///
    /// This is the rate reported by the device (commonly 44 100 or 48 000
    /// Hz) — the processor reads it once at construction.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels the device delivers (only the first is
    /// forwarded).
    pub fn channels(&self) -> u16 {
        self.channels
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
