//! Decoder module boundary — arena allocation, sample staging, frame decode.
//!
//! The MT63 decoder ships as a separately compiled module with its own linear
//! sample arena.  This file defines the two seams the pipeline talks through:
//!
//! * [`DecoderModule`] — a live, initialised decoder: reserve arena space,
//!   stage samples into it, and decode a staged frame.
//! * [`DecoderFactory`] — instantiates a [`DecoderModule`] from the module's
//!   compiled binary (delivered over the control channel at startup).
//!
//! Both are object-safe and `Send + Sync` so they can be held behind
//! `Arc<dyn …>` and shared between the processing thread and the one-shot
//! initialisation thread (see [`crate::decoder::DecoderLatch`]).
//!
//! [`MockDecoderModule`] / [`MockDecoderFactory`] (available under
//! `#[cfg(test)]`) back the accumulator, latch, and processor tests without a
//! real decoder build.

use std::sync::Arc;

use thiserror::Error;

// ---------------------------------------------------------------------------
// DecoderError
// ---------------------------------------------------------------------------

/// Errors that can arise from the decoder module boundary.
#[derive(Debug, Clone, Error)]
pub enum DecoderError {
    /// The delivered binary is not a loadable decoder module.
    #[error("invalid decoder binary: {0}")]
    InvalidBinary(String),

    /// The module arena has no room for the requested reservation.
    #[error("decoder arena exhausted: requested {requested} samples")]
    ArenaExhausted { requested: usize },

    /// No decoder engine is available in this build / environment.
    #[error("decoder unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// ArenaPtr
// ---------------------------------------------------------------------------

/// Opaque sample offset into a decoder module's linear arena.
///
/// Only meaningful to the [`DecoderModule`] that handed it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaPtr(usize);

impl ArenaPtr {
    /// Wrap a raw sample offset.  Module implementations call this from
    /// [`DecoderModule::alloc`]; pipeline code never constructs one.
    pub fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// The raw sample offset into the module arena.
    pub fn offset(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// DecoderModule trait
// ---------------------------------------------------------------------------

/// A live decoder module with its sample arena.
///
/// # Contract
///
/// - [`alloc`](Self::alloc) reserves `len` contiguous `f32` slots and returns
///   their [`ArenaPtr`]; reservations are never released.
/// - [`write`](Self::write) stages samples at `ptr + offset`.  Writing past a
///   reservation is a caller bug and implementations may panic.
/// - [`decode`](Self::decode) runs the decoder over the `len` staged samples
///   at `ptr` and returns the decoded payload — empty when the frame carried
///   no decodable signal.  Decode does not fail on valid, staged input.
///
/// Implementations use interior mutability; every method takes `&self` so a
/// module can be shared behind `Arc<dyn DecoderModule>`.
pub trait DecoderModule: Send + Sync {
    /// Reserve `len` samples of arena space.
    fn alloc(&self, len: usize) -> Result<ArenaPtr, DecoderError>;

    /// Copy `samples` into the arena at `ptr + offset` (sample units).
    fn write(&self, ptr: ArenaPtr, offset: usize, samples: &[f32]);

    /// Decode the `len`-sample frame staged at `ptr`, captured at
    /// `sample_rate` Hz.  An empty payload means nothing was decoded.
    fn decode(&self, ptr: ArenaPtr, sample_rate: u32, len: usize) -> Vec<u8>;
}

// Compile-time assertion: Box<dyn DecoderModule> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn DecoderModule>) {}
};

// ---------------------------------------------------------------------------
// DecoderFactory trait
// ---------------------------------------------------------------------------

/// Instantiates a [`DecoderModule`] from its compiled binary.
///
/// Called once, on a background thread, when the host delivers the binary
/// over the control channel.  The returned module must be fully usable —
/// readers of the latch never see a partially initialised module.
pub trait DecoderFactory: Send + Sync {
    /// Build a module from `binary`.
    ///
    /// # Errors
    ///
    /// [`DecoderError::InvalidBinary`] when the payload is not a loadable
    /// module, or [`DecoderError::Unavailable`] when this build carries no
    /// decoder engine at all.
    fn load(&self, binary: &[u8]) -> Result<Arc<dyn DecoderModule>, DecoderError>;
}

// ---------------------------------------------------------------------------
// MockDecoderModule  (test-only)
// ---------------------------------------------------------------------------

/// Test double: a heap-backed arena with bump allocation.
///
/// Records every decode call (a snapshot of the staged frame) so tests can
/// assert on sample continuity, and returns scripted payloads in order.
#[cfg(test)]
pub struct MockDecoderModule {
    arena: std::sync::Mutex<Vec<f32>>,
    next: std::sync::Mutex<usize>,
    alloc_count: std::sync::atomic::AtomicUsize,
    payloads: std::sync::Mutex<std::collections::VecDeque<Vec<u8>>>,
    decoded_frames: std::sync::Mutex<Vec<Vec<f32>>>,
}

#[cfg(test)]
impl MockDecoderModule {
    /// Create a mock with `capacity` samples of arena space.
    pub fn new(capacity: usize) -> Self {
        Self {
            arena: std::sync::Mutex::new(vec![0.0; capacity]),
            next: std::sync::Mutex::new(0),
            alloc_count: std::sync::atomic::AtomicUsize::new(0),
            payloads: std::sync::Mutex::new(std::collections::VecDeque::new()),
            decoded_frames: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queue a payload for the next [`DecoderModule::decode`] call.  Calls
    /// past the end of the queue return an empty payload.
    pub fn push_payload(&self, payload: Vec<u8>) {
        self.payloads.lock().unwrap().push_back(payload);
    }

    /// Number of successful [`DecoderModule::alloc`] calls so far.
    pub fn alloc_count(&self) -> usize {
        self.alloc_count.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Snapshots of every frame handed to [`DecoderModule::decode`].
    pub fn decoded_frames(&self) -> Vec<Vec<f32>> {
        self.decoded_frames.lock().unwrap().clone()
    }

    /// Raw view of `len` arena samples at `ptr` — for staging assertions.
    pub fn arena_slice(&self, ptr: ArenaPtr, len: usize) -> Vec<f32> {
        self.arena.lock().unwrap()[ptr.offset()..ptr.offset() + len].to_vec()
    }
}

#[cfg(test)]
impl DecoderModule for MockDecoderModule {
    fn alloc(&self, len: usize) -> Result<ArenaPtr, DecoderError> {
        let mut next = self.next.lock().unwrap();
        if *next + len > self.arena.lock().unwrap().len() {
            return Err(DecoderError::ArenaExhausted { requested: len });
        }
        let ptr = ArenaPtr::new(*next);
        *next += len;
        self.alloc_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(ptr)
    }

    fn write(&self, ptr: ArenaPtr, offset: usize, samples: &[f32]) {
        let start = ptr.offset() + offset;
        self.arena.lock().unwrap()[start..start + samples.len()].copy_from_slice(samples);
    }

    fn decode(&self, ptr: ArenaPtr, _sample_rate: u32, len: usize) -> Vec<u8> {
        let frame = self.arena_slice(ptr, len);
        self.decoded_frames.lock().unwrap().push(frame);
        self.payloads.lock().unwrap().pop_front().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// MockDecoderFactory  (test-only)
// ---------------------------------------------------------------------------

/// Test double factory: counts load calls and either hands out a shared
/// [`MockDecoderModule`] or fails with a scripted error.
#[cfg(test)]
pub struct MockDecoderFactory {
    result: Result<Arc<MockDecoderModule>, DecoderError>,
    load_count: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockDecoderFactory {
    /// Factory whose loads all succeed with `module`.
    pub fn ok(module: Arc<MockDecoderModule>) -> Self {
        Self {
            result: Ok(module),
            load_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Factory whose loads all fail with `error`.
    pub fn err(error: DecoderError) -> Self {
        Self {
            result: Err(error),
            load_count: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of [`DecoderFactory::load`] calls so far.
    pub fn load_count(&self) -> usize {
        self.load_count.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl DecoderFactory for MockDecoderFactory {
    fn load(&self, _binary: &[u8]) -> Result<Arc<dyn DecoderModule>, DecoderError> {
        self.load_count
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.result {
            Ok(module) => Ok(Arc::clone(module) as Arc<dyn DecoderModule>),
            Err(e) => Err(e.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
