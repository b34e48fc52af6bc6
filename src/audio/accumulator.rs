//! Fixed-size analysis frame assembly from variable-length input blocks.
//!
//! The audio driver delivers blocks of whatever size it likes; the decoder
//! and the fallback resampler both want exactly [`frame_size`] samples at a
//! time.  [`FrameAccumulator`] bridges the two: blocks are appended at a
//! write cursor, and when a block tops the frame off the caller gets the
//! unconsumed tail back (the *remnant*) so the completed frame can be
//! consumed in place before the tail overwrites it.
//!
//! The backing storage is a tagged variant, [`ActiveBuffer`]: a crate-owned
//! heap buffer until the decoder module comes up, then a region inside the
//! module's arena.  [`FrameAccumulator::migrate`] performs that swap exactly
//! once, carrying the partially filled frame across so no sample is lost.
//!
//! # Caller protocol
//!
//! ```text
//! push(block) ──▶ Ok(None)            keep pushing
//!            ──▶ Ok(Some(remnant))   frame_view() → consume → restart(remnant)
//!            ──▶ Err(BlockTooLong)   block rejected, nothing consumed
//! ```
//!
//! `push` never allocates; the only allocations are the heap buffer at
//! construction and the arena reservation inside `migrate`.
//!
//! [`frame_size`]: FrameAccumulator::frame_size

use std::sync::Arc;

use thiserror::Error;

use crate::decoder::{ArenaPtr, DecoderError, DecoderModule};

/// Extra samples reserved past the frame end when allocating in the decoder
/// arena.
pub const ARENA_PADDING: usize = 10;

// ---------------------------------------------------------------------------
// ChunkError
// ---------------------------------------------------------------------------

/// Errors raised while assembling frames.
#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    /// The input block would complete more than one frame in a single call.
    /// Driver blocks are expected to be small relative to the frame size;
    /// anything longer than the remaining fill plus one whole frame is
    /// unsupported input.
    #[error(
        "input block of {len} samples would complete more than one \
         {frame_size}-sample frame ({remaining} samples remaining)"
    )]
    BlockTooLong {
        len: usize,
        frame_size: usize,
        remaining: usize,
    },
}

// ---------------------------------------------------------------------------
// ActiveBuffer / FrameView
// ---------------------------------------------------------------------------

/// The storage a frame is currently assembled in — exactly one of the two is
/// ever the active write target.
enum ActiveBuffer {
    /// Crate-owned heap buffer, used until the decoder module is ready.
    Heap(Vec<f32>),
    /// Reservation inside the decoder module's arena.
    Arena {
        module: Arc<dyn DecoderModule>,
        ptr: ArenaPtr,
    },
}

/// Zero-copy reference to a completed frame, tagged with where it lives so
/// the caller can route it (heap frames → resample, arena frames → decode).
pub enum FrameView<'a> {
    /// Frame contents in crate-owned memory.
    Heap(&'a [f32]),
    /// Frame staged in the decoder arena at `ptr`.
    Arena {
        module: &'a Arc<dyn DecoderModule>,
        ptr: ArenaPtr,
    },
}

// ---------------------------------------------------------------------------
// FrameAccumulator
// ---------------------------------------------------------------------------

/// Assembles variable-length sample blocks into fixed-size analysis frames.
pub struct FrameAccumulator {
    buffer: ActiveBuffer,
    frame_size: usize,
    /// Write cursor into the active buffer.  Equals `frame_size` only while a
    /// completed frame is pending consumption (between a `Some` return from
    /// [`push`](Self::push) and the matching [`restart`](Self::restart)).
    loc: usize,
}

impl FrameAccumulator {
    /// Create an accumulator assembling `frame_size`-sample frames into a
    /// heap buffer.
    ///
    /// # Panics
    ///
    /// Panics if `frame_size == 0`.
    pub fn new(frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame_size must be > 0");
        Self {
            buffer: ActiveBuffer::Heap(vec![0.0; frame_size]),
            frame_size,
            loc: 0,
        }
    }

    /// The fixed analysis frame length in samples.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Current write cursor (samples buffered toward the next frame).
    pub fn loc(&self) -> usize {
        self.loc
    }

    /// `true` once the accumulator writes into the decoder arena.
    pub fn is_native(&self) -> bool {
        matches!(self.buffer, ActiveBuffer::Arena { .. })
    }

    /// Append `block` at the write cursor.
    ///
    /// Returns `Ok(Some(remnant))` when the block filled the frame: the frame
    /// is left intact for [`frame_view`](Self::frame_view) and `remnant` is
    /// the tail of `block` that belongs to the next frame (always shorter
    /// than one frame).  The caller must consume the frame and then call
    /// [`restart`](Self::restart) with the remnant before pushing again.
    ///
    /// # Errors
    ///
    /// [`ChunkError::BlockTooLong`] when the block would complete more than
    /// one frame; nothing is consumed in that case.
    pub fn push<'a>(&mut self, block: &'a [f32]) -> Result<Option<&'a [f32]>, ChunkError> {
        assert!(
            self.loc < self.frame_size,
            "completed frame pending; restart() must run before the next push"
        );

        let remaining = self.frame_size - self.loc;
        if block.len() < remaining {
            self.write(self.loc, block);
            self.loc += block.len();
            return Ok(None);
        }

        // Reject before touching the buffer: the tail past the fill must not
        // itself fill a whole frame.
        if block.len() - remaining >= self.frame_size {
            return Err(ChunkError::BlockTooLong {
                len: block.len(),
                frame_size: self.frame_size,
                remaining,
            });
        }

        let (fill, remnant) = block.split_at(remaining);
        self.write(self.loc, fill);
        self.loc = self.frame_size;
        Ok(Some(remnant))
    }

    /// View the completed frame.
    ///
    /// # Panics
    ///
    /// Panics unless a completed frame is pending (see [`push`](Self::push)).
    pub fn frame_view(&self) -> FrameView<'_> {
        assert!(
            self.loc == self.frame_size,
            "frame_view() called without a completed frame pending"
        );
        match &self.buffer {
            ActiveBuffer::Heap(buf) => FrameView::Heap(&buf[..self.frame_size]),
            ActiveBuffer::Arena { module, ptr } => FrameView::Arena { module, ptr: *ptr },
        }
    }

    /// Begin the next frame with `remnant` (the tail returned by the
    /// completing [`push`](Self::push)) written at offset 0.
    pub fn restart(&mut self, remnant: &[f32]) {
        debug_assert!(remnant.len() < self.frame_size);
        self.write(0, remnant);
        self.loc = remnant.len();
    }

    /// Migrate accumulation from the heap buffer into `module`'s arena.
    ///
    /// Reserves `frame_size + ARENA_PADDING` samples, copies the filled
    /// region `[0, loc)` across at the same offset, and makes the arena the
    /// active write target.  Must not run while a completed frame is pending.
    /// On allocation failure the heap buffer stays active and untouched.
    pub fn migrate(&mut self, module: Arc<dyn DecoderModule>) -> Result<(), DecoderError> {
        debug_assert!(self.loc < self.frame_size, "migrate during a frame boundary");
        let ActiveBuffer::Heap(pending) = &self.buffer else {
            debug_assert!(false, "migrate called twice");
            return Ok(());
        };

        let ptr = module.alloc(self.frame_size + ARENA_PADDING)?;
        module.write(ptr, 0, &pending[..self.loc]);
        self.buffer = ActiveBuffer::Arena { module, ptr };
        Ok(())
    }

    /// Write `samples` at `offset` into whichever buffer is active.
    fn write(&mut self, offset: usize, samples: &[f32]) {
        match &mut self.buffer {
            ActiveBuffer::Heap(buf) => {
                buf[offset..offset + samples.len()].copy_from_slice(samples);
            }
            ActiveBuffer::Arena { module, ptr } => {
                module.write(*ptr, offset, samples);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
