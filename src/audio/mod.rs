//! Audio front end — microphone capture, frame assembly, fallback resampling.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback → Vec<f32> blocks (mpsc)
//!           → FrameAccumulator (fixed-size analysis frames)
//!           → decode (arena) | downsample to 8 kHz (heap)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//! use mt63_rx::audio::AudioCapture;
//!
//! let (tx, rx) = mpsc::channel::<Vec<f32>>();
//! let capture = AudioCapture::new(None).unwrap();
//! let _handle = capture.start(tx).unwrap(); // drop handle → stops stream
//!
//! while let Ok(block) = rx.recv() {
//!     println!("received {} samples @ {}Hz", block.len(), capture.sample_rate());
//! }
//! ```

pub mod accumulator;
pub mod capture;
pub mod resample;

pub use accumulator::{ChunkError, FrameAccumulator, FrameView, ARENA_PADDING};
pub use capture::{AudioCapture, CaptureError, StreamHandle};
pub use resample::{downsample, resampled_capacity};
