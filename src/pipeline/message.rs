//! Control-channel message shapes.
//!
//! The processor and its consumer talk over a pair of one-way, in-order mpsc
//! channels: [`OutboundMessage`] flows processor → consumer (results and the
//! startup handshake request), [`ControlMessage`] flows consumer → processor
//! (binary delivery, shutdown).  Unrecognised traffic is impossible by
//! construction — the enums are the wire format.

// ---------------------------------------------------------------------------
// OutboundMessage
// ---------------------------------------------------------------------------

/// Messages posted by the processor to its consumer.
///
/// Delivery order matches frame completion order; the channel is FIFO per
/// sender so no extra sequencing is carried.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    /// Startup handshake: ask the host to deliver the decoder module binary.
    /// Sent once, at construction, when the decoder is not already up.
    BinaryRequest,

    /// Opaque payload the decoder produced for one frame.  Never empty —
    /// frames that decode to nothing post no message.
    Decoded(Vec<u8>),

    /// One frame of fallback audio, downsampled to `sample_rate` Hz.
    Audio { samples: Vec<f32>, sample_rate: u32 },
}

// ---------------------------------------------------------------------------
// ControlMessage
// ---------------------------------------------------------------------------

/// Control messages delivered to the processor.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    /// The decoder module's compiled binary (the host's answer to
    /// [`OutboundMessage::BinaryRequest`]).  Deliveries after the decoder is
    /// up are no-ops.
    Binary(Vec<u8>),

    /// Stop processing.  Takes effect permanently; buffered partial frames
    /// are discarded, not flushed.
    Shutdown,
}

// ---------------------------------------------------------------------------
// DecodePath
// ---------------------------------------------------------------------------

/// Which of the two processing paths handled a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Software resampling; frames are forwarded as 8 kHz audio.
    Fallback,
    /// The decoder module consumes frames in place from its arena.
    Native,
}

impl DecodePath {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            DecodePath::Fallback => "fallback resample",
            DecodePath::Native => "native decode",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
