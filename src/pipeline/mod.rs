//! Receive pipeline — frame processing, path selection, host wiring.
//!
//! # Architecture
//!
//! ```text
//! Vec<f32> blocks (mpsc)                  ControlMessage (mpsc)
//!        │                                       │
//!        ▼                                       ▼
//! Mt63Processor::process()  ◀──────  Mt63Processor::handle_control()
//!        │                                       │
//!        ├─ FrameAccumulator (fixed frames)      ├─ Binary  → DecoderLatch::install_async
//!        │                                       └─ Shutdown → active = false
//!        ├─ heap frame  → downsample → OutboundMessage::Audio
//!        └─ arena frame → decode     → OutboundMessage::Decoded
//!
//! OutboundMessage (mpsc, FIFO) ──▶ consumer
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mt63_rx::decoder::{DecoderFactory, DecoderLatch};
//! use mt63_rx::pipeline::Mt63Node;
//!
//! # fn make_factory() -> Arc<dyn DecoderFactory> { unimplemented!() }
//! let latch = Arc::new(DecoderLatch::new());
//! let node = Mt63Node::spawn(None, latch, make_factory()).unwrap();
//! for event in node.events().iter() {
//!     println!("{event:?}");
//! }
//! ```

pub mod message;
pub mod node;
pub mod processor;

pub use message::{ControlMessage, DecodePath, OutboundMessage};
pub use node::Mt63Node;
pub use processor::{Mt63Processor, FRAME_SIZE, TARGET_RATE};
