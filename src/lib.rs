//! MT63 receive pipeline — real-time frame assembly and dual-path dispatch.
//!
//! Streams live microphone audio into fixed-size analysis frames and, per
//! frame, either hands the samples to a native MT63 decoder module (staged
//! directly in the module's arena) or, while that module is not yet up,
//! downsamples them to 8 kHz and forwards the audio to the consumer.
//!
//! # Architecture
//!
//! ```text
//! Microphone → cpal callback → Vec<f32> blocks (mpsc)
//!     → mt63-rx thread: Mt63Processor
//!          ├─ FrameAccumulator   (fixed 2304-sample frames)
//!          ├─ native decode      (decoder arena, after binary delivery)
//!          └─ fallback resample  (8 kHz forwarding, before it)
//!     → OutboundMessage (mpsc) → consumer
//! ```
//!
//! The decoder module itself is external: [`decoder`] defines the boundary
//! traits and the one-way readiness latch that lets initialisation run off
//! the real-time path.  [`pipeline::Mt63Node`] wires a microphone to a
//! processor thread in one call.

pub mod audio;
pub mod config;
pub mod decoder;
pub mod pipeline;

pub use pipeline::{ControlMessage, Mt63Node, Mt63Processor, OutboundMessage, FRAME_SIZE};
