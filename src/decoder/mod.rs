//! Decoder module boundary and readiness handoff.
//!
//! # Architecture
//!
//! ```text
//! ControlMessage::Binary ──▶ DecoderLatch::install_async
//!                                  │  (decoder-init thread)
//!                                  ▼
//!                        DecoderFactory::load(binary)
//!                                  │ ok
//!                                  ▼
//!                        DecoderLatch (OnceLock) ◀── read at block boundaries
//!                                  │                  by the processing thread
//!                                  ▼
//!                        DecoderModule: alloc / write / decode
//! ```
//!
//! The decoder's DSP lives outside this crate; these traits are the whole
//! surface the pipeline depends on.

pub mod latch;
pub mod module;

pub use latch::DecoderLatch;
pub use module::{ArenaPtr, DecoderError, DecoderFactory, DecoderModule};

#[cfg(test)]
pub use module::{MockDecoderFactory, MockDecoderModule};
