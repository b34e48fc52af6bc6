//! The real-time frame processor — path selection, dispatch, and emission.
//!
//! [`Mt63Processor`] is driven synchronously from the audio processing
//! thread: [`process`](Mt63Processor::process) for every sample block,
//! [`handle_control`](Mt63Processor::handle_control) for every control
//! message.  It owns the [`FrameAccumulator`] and, per completed frame,
//! routes to exactly one of two paths:
//!
//! * **Native** — the frame already sits in the decoder arena; one
//!   [`decode`](crate::decoder::DecoderModule::decode) call, non-empty
//!   payloads go out as [`OutboundMessage::Decoded`].
//! * **Fallback** — the frame sits in the heap buffer; it is downsampled to
//!   8 kHz into a reused scratch buffer and goes out as
//!   [`OutboundMessage::Audio`].
//!
//! The path is a one-way latch: construction starts on Fallback, and the
//! first block boundary at which the shared [`DecoderLatch`] reports ready
//! migrates accumulation into the decoder arena (carrying the partial frame
//! across).  Migration never interleaves with a push, so a push observes
//! either the old or the new buffer, never a half-migrated state.
//!
//! Steady state performs no allocation: the heap buffer exists from
//! construction, the arena reservation happens once at migration, and the
//! resample scratch buffer is allocated on the first fallback frame and
//! reused.  The per-frame outbound payload is the one owned copy handed to
//! the channel.

use std::sync::mpsc;
use std::sync::Arc;

use crate::audio::{downsample, resampled_capacity, FrameAccumulator, FrameView};
use crate::decoder::{DecoderFactory, DecoderLatch};

use super::message::{ControlMessage, DecodePath, OutboundMessage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Analysis frame length in samples.  Must be a multiple of 6 (the fallback
/// decimation granularity) and ideally of 128.
pub const FRAME_SIZE: usize = 6 * 128 * 3;

/// Fallback forwarding rate in Hz.
pub const TARGET_RATE: u32 = 8_000;

const _: () = assert!(FRAME_SIZE % 6 == 0);
const _: () = assert!(FRAME_SIZE % 128 == 0);

// ---------------------------------------------------------------------------
// Mt63Processor
// ---------------------------------------------------------------------------

/// Dual-path frame processor for one capture stream.
///
/// Create with [`Mt63Processor::new`], then drive it from a single thread.
/// Several processors may share one [`DecoderLatch`]; the module loads once.
pub struct Mt63Processor {
    accumulator: FrameAccumulator,
    latch: Arc<DecoderLatch>,
    factory: Arc<dyn DecoderFactory>,
    outbound: mpsc::Sender<OutboundMessage>,
    /// Capture rate, read once at construction.
    source_rate: u32,
    /// Scratch space for the fallback path; sized on first use, then reused.
    resample_buf: Option<Vec<f32>>,
    /// Flips false permanently on [`ControlMessage::Shutdown`].
    active: bool,
    /// Set when the arena reservation failed; the processor then stays on
    /// the fallback path instead of re-attempting every block.
    migration_failed: bool,
    /// Last path reported in the log — mode changes are logged once, not
    /// per frame.
    last_path: Option<DecodePath>,
}

impl Mt63Processor {
    /// Create a processor for a capture stream running at `source_rate` Hz.
    ///
    /// When the shared `latch` is not already ready, an
    /// [`OutboundMessage::BinaryRequest`] is posted so the host starts the
    /// binary-delivery handshake.
    ///
    /// # Panics
    ///
    /// Panics if `source_rate == 0`.
    pub fn new(
        source_rate: u32,
        latch: Arc<DecoderLatch>,
        factory: Arc<dyn DecoderFactory>,
        outbound: mpsc::Sender<OutboundMessage>,
    ) -> Self {
        assert!(source_rate > 0, "source_rate must be > 0");

        if !latch.is_ready() {
            let _ = outbound.send(OutboundMessage::BinaryRequest);
        }

        Self {
            accumulator: FrameAccumulator::new(FRAME_SIZE),
            latch,
            factory,
            outbound,
            source_rate,
            resample_buf: None,
            active: true,
            migration_failed: false,
            last_path: None,
        }
    }

    /// Whether the processor should keep being driven.  `false` once a
    /// shutdown message has been handled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Feed one capture block through the pipeline.
    ///
    /// Returns the continue-running signal — the same value as
    /// [`is_active`](Self::is_active).  An oversized block (one that would
    /// complete more than one frame) is logged and dropped; processing
    /// resumes with the next block.
    pub fn process(&mut self, block: &[f32]) -> bool {
        self.poll_decoder();

        match self.accumulator.push(block) {
            Ok(Some(remnant)) => {
                self.dispatch_frame();
                self.accumulator.restart(remnant);
            }
            Ok(None) => {}
            Err(e) => {
                log::warn!("dropping input block: {e}");
            }
        }

        self.active
    }

    /// Handle one inbound control message.
    pub fn handle_control(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Binary(binary) => {
                let _ = self
                    .latch
                    .install_async(Arc::clone(&self.factory), binary);
            }
            ControlMessage::Shutdown => {
                log::info!("shutdown requested; discarding buffered samples");
                self.active = false;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Path selection
    // -----------------------------------------------------------------------

    /// Migrate accumulation into the decoder arena once the latch is ready.
    ///
    /// Runs between pushes only, so the swap never straddles a frame
    /// boundary.
    fn poll_decoder(&mut self) {
        if self.accumulator.is_native() || self.migration_failed {
            return;
        }
        let Some(module) = self.latch.get() else {
            return;
        };

        match self.accumulator.migrate(Arc::clone(module)) {
            Ok(()) => {
                log::debug!("accumulation buffer migrated into the decoder arena");
            }
            Err(e) => {
                log::warn!("arena reservation failed, staying on the fallback path: {e}");
                self.migration_failed = true;
            }
        }
    }

    /// Route the completed frame to its path and emit the result.
    fn dispatch_frame(&mut self) {
        let path = if self.accumulator.is_native() {
            DecodePath::Native
        } else {
            DecodePath::Fallback
        };
        self.note_path(path);

        match self.accumulator.frame_view() {
            FrameView::Arena { module, ptr } => {
                let payload = module.decode(ptr, self.source_rate, FRAME_SIZE);
                if !payload.is_empty() {
                    let _ = self.outbound.send(OutboundMessage::Decoded(payload));
                }
            }
            FrameView::Heap(frame) => {
                let capacity = resampled_capacity(FRAME_SIZE, self.source_rate, TARGET_RATE);
                let scratch = self
                    .resample_buf
                    .get_or_insert_with(|| vec![0.0; capacity]);
                let produced =
                    downsample(frame, FRAME_SIZE, self.source_rate, TARGET_RATE, scratch);
                let _ = self.outbound.send(OutboundMessage::Audio {
                    samples: scratch[..produced].to_vec(),
                    sample_rate: TARGET_RATE,
                });
            }
        }
    }

    fn note_path(&mut self, path: DecodePath) {
        if self.last_path != Some(path) {
            log::info!("processing path: {}", path.label());
            self.last_path = Some(path);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecoderError, MockDecoderFactory, MockDecoderModule};
    use std::sync::mpsc::Receiver;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Fixture {
        processor: Mt63Processor,
        outbound: Receiver<OutboundMessage>,
        latch: Arc<DecoderLatch>,
        module: Arc<MockDecoderModule>,
        factory: Arc<MockDecoderFactory>,
    }

    /// A processor at 48 kHz with a mock decoder factory; the latch starts
    /// unready.
    fn fixture() -> Fixture {
        let module = Arc::new(MockDecoderModule::new(8 * FRAME_SIZE));
        let factory = Arc::new(MockDecoderFactory::ok(Arc::clone(&module)));
        let latch = Arc::new(DecoderLatch::new());
        let (tx, rx) = mpsc::channel();
        let processor = Mt63Processor::new(
            48_000,
            Arc::clone(&latch),
            Arc::clone(&factory) as Arc<dyn DecoderFactory>,
            tx,
        );
        Fixture {
            processor,
            outbound: rx,
            latch,
            module,
            factory,
        }
    }

    /// Deliver the decoder binary and wait for the background load.
    fn deliver_binary(fx: &mut Fixture) {
        fx.processor.handle_control(ControlMessage::Binary(vec![0xAA]));
        // handle_control spawns decoder-init; wait for the latch to flip so
        // the next process() call observes it deterministically.
        while !fx.latch.is_ready() {
            std::thread::yield_now();
        }
    }

    fn drain(rx: &Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    // -----------------------------------------------------------------------
    // Startup handshake
    // -----------------------------------------------------------------------

    #[test]
    fn construction_requests_binary_when_latch_unready() {
        let fx = fixture();
        let msgs = drain(&fx.outbound);
        assert!(matches!(msgs.as_slice(), [OutboundMessage::BinaryRequest]));
    }

    #[test]
    fn construction_skips_request_when_latch_ready() {
        let module = Arc::new(MockDecoderModule::new(8 * FRAME_SIZE));
        let factory = Arc::new(MockDecoderFactory::ok(Arc::clone(&module)));
        let latch = Arc::new(DecoderLatch::new());
        assert!(latch.install(Arc::clone(&module) as _));

        let (tx, rx) = mpsc::channel();
        let _processor =
            Mt63Processor::new(48_000, latch, factory as Arc<dyn DecoderFactory>, tx);
        assert!(drain(&rx).is_empty());
    }

    // -----------------------------------------------------------------------
    // Fallback path
    // -----------------------------------------------------------------------

    /// 24 blocks of 96 samples (= one 2304-sample frame) at 48 kHz with no
    /// decoder loaded must yield exactly one 8 kHz audio message of at most
    /// 384 samples.
    #[test]
    fn fallback_emits_one_audio_message_per_frame() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound); // discard the startup request

        let block = vec![0.5_f32; 96];
        for _ in 0..24 {
            assert!(fx.processor.process(&block));
        }

        let msgs = drain(&fx.outbound);
        assert_eq!(msgs.len(), 1);
        match &msgs[0] {
            OutboundMessage::Audio {
                samples,
                sample_rate,
            } => {
                assert_eq!(*sample_rate, 8_000);
                assert!(samples.len() <= 384, "got {} samples", samples.len());
            }
            other => panic!("expected Audio, got {other:?}"),
        }
    }

    #[test]
    fn partial_frame_emits_nothing() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        fx.processor.process(&vec![0.0_f32; FRAME_SIZE - 1]);
        assert!(drain(&fx.outbound).is_empty());
    }

    // -----------------------------------------------------------------------
    // Native path and migration
    // -----------------------------------------------------------------------

    #[test]
    fn frames_route_native_after_binary_delivery() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);
        deliver_binary(&mut fx);

        fx.module.push_payload(b"MT63 QSO".to_vec());
        fx.processor.process(&vec![0.25_f32; FRAME_SIZE]);

        let msgs = drain(&fx.outbound);
        assert!(matches!(
            msgs.as_slice(),
            [OutboundMessage::Decoded(payload)] if payload == b"MT63 QSO"
        ));
        assert_eq!(fx.module.decoded_frames().len(), 1);
    }

    #[test]
    fn empty_decode_results_post_no_message() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);
        deliver_binary(&mut fx);

        // No scripted payload → the mock decodes to empty.
        fx.processor.process(&vec![0.25_f32; FRAME_SIZE]);
        assert!(drain(&fx.outbound).is_empty());
        assert_eq!(fx.module.decoded_frames().len(), 1);
    }

    #[test]
    fn migration_happens_exactly_once() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        // Two fallback frames first.
        for _ in 0..2 {
            fx.processor.process(&vec![0.1_f32; FRAME_SIZE]);
        }
        deliver_binary(&mut fx);
        // Several more blocks after readiness.
        for _ in 0..3 {
            fx.processor.process(&vec![0.1_f32; FRAME_SIZE]);
        }

        // One reservation total, despite five completed frames.
        assert_eq!(fx.module.alloc_count(), 1);
        assert_eq!(fx.module.decoded_frames().len(), 3);
    }

    /// A partial fill must survive the migration: the frame completed after
    /// the switch contains the pre-migration samples followed by the
    /// post-migration ones.
    #[test]
    fn no_sample_discontinuity_across_migration() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        let first_half: Vec<f32> = (0..FRAME_SIZE / 2).map(|i| i as f32).collect();
        fx.processor.process(&first_half);

        deliver_binary(&mut fx);

        let second_half: Vec<f32> =
            (FRAME_SIZE / 2..FRAME_SIZE).map(|i| i as f32).collect();
        fx.processor.process(&second_half);

        let frames = fx.module.decoded_frames();
        assert_eq!(frames.len(), 1);
        let expected: Vec<f32> = (0..FRAME_SIZE).map(|i| i as f32).collect();
        assert_eq!(frames[0], expected);
    }

    #[test]
    fn second_binary_delivery_is_idempotent() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);
        deliver_binary(&mut fx);

        fx.processor.handle_control(ControlMessage::Binary(vec![0xBB]));
        fx.processor.process(&vec![0.0_f32; FRAME_SIZE]);

        assert_eq!(fx.factory.load_count(), 1);
        assert_eq!(fx.module.alloc_count(), 1);
    }

    #[test]
    fn failed_initialisation_stays_on_fallback() {
        let factory = Arc::new(MockDecoderFactory::err(DecoderError::InvalidBinary(
            "bad magic".into(),
        )));
        let latch = Arc::new(DecoderLatch::new());
        let (tx, rx) = mpsc::channel();
        let mut processor = Mt63Processor::new(
            48_000,
            Arc::clone(&latch),
            factory as Arc<dyn DecoderFactory>,
            tx,
        );
        let _ = drain(&rx);

        processor.handle_control(ControlMessage::Binary(vec![0x00]));
        // The failed load never flips the latch; frames keep falling back.
        processor.process(&vec![0.0_f32; FRAME_SIZE]);
        let msgs = drain(&rx);
        assert!(matches!(msgs.as_slice(), [OutboundMessage::Audio { .. }]));
    }

    #[test]
    fn failed_arena_reservation_latches_fallback() {
        // Arena too small for FRAME_SIZE + padding: migration fails once and
        // is not retried.
        let module = Arc::new(MockDecoderModule::new(16));
        let factory = Arc::new(MockDecoderFactory::ok(Arc::clone(&module)));
        let latch = Arc::new(DecoderLatch::new());
        assert!(latch.install(Arc::clone(&module) as _));

        let (tx, rx) = mpsc::channel();
        let mut processor = Mt63Processor::new(
            48_000,
            latch,
            factory as Arc<dyn DecoderFactory>,
            tx,
        );

        for _ in 0..2 {
            processor.process(&vec![0.0_f32; FRAME_SIZE]);
        }
        // One failed reservation, then fallback audio for every frame.
        assert_eq!(module.alloc_count(), 0);
        let msgs = drain(&rx);
        assert_eq!(msgs.len(), 2);
        assert!(msgs
            .iter()
            .all(|m| matches!(m, OutboundMessage::Audio { .. })));
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[test]
    fn shutdown_is_permanent() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        assert!(fx.processor.process(&vec![0.0_f32; 96]));
        fx.processor.handle_control(ControlMessage::Shutdown);

        assert!(!fx.processor.is_active());
        assert!(!fx.processor.process(&vec![0.0_f32; 96]));
        assert!(!fx.processor.process(&[]));
    }

    #[test]
    fn oversized_block_is_dropped_and_processing_continues() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        // Would complete two frames in one call → rejected.
        assert!(fx.processor.process(&vec![0.0_f32; 2 * FRAME_SIZE + 1]));
        assert!(drain(&fx.outbound).is_empty());

        // The pipeline still works afterwards.
        fx.processor.process(&vec![0.0_f32; FRAME_SIZE]);
        assert_eq!(drain(&fx.outbound).len(), 1);
    }

    // -----------------------------------------------------------------------
    // Emission ordering
    // -----------------------------------------------------------------------

    #[test]
    fn messages_preserve_frame_completion_order() {
        let mut fx = fixture();
        let _ = drain(&fx.outbound);

        // Two fallback frames, then migrate, then a native frame.
        fx.processor.process(&vec![0.1_f32; FRAME_SIZE]);
        fx.processor.process(&vec![0.2_f32; FRAME_SIZE]);
        deliver_binary(&mut fx);
        fx.module.push_payload(b"73".to_vec());
        fx.processor.process(&vec![0.3_f32; FRAME_SIZE]);

        let msgs = drain(&fx.outbound);
        assert_eq!(msgs.len(), 3);
        assert!(matches!(msgs[0], OutboundMessage::Audio { .. }));
        assert!(matches!(msgs[1], OutboundMessage::Audio { .. }));
        assert!(matches!(&msgs[2], OutboundMessage::Decoded(p) if p == b"73"));
    }
}
