//! Host wiring — capture stream, processing thread, channel endpoints.
//!
//! [`Mt63Node`] is the thin setup layer that connects a microphone to a
//! running [`Mt63Processor`]: it opens the capture device, spawns the
//! dedicated `mt63-rx` processing thread, and hands the consumer the two
//! channel endpoints (outbound events in, control messages out).
//!
//! The processing thread's loop drains pending control messages, then waits
//! briefly for the next capture block.  The short wait keeps shutdown
//! responsive even when the microphone goes silent or the stream dies.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::audio::{AudioCapture, CaptureError, StreamHandle};
use crate::decoder::{DecoderFactory, DecoderLatch};

use super::message::{ControlMessage, OutboundMessage};
use super::processor::Mt63Processor;

/// How long the processing thread waits for a capture block before checking
/// the shutdown flag again.
const BLOCK_WAIT: Duration = Duration::from_millis(50);

// ---------------------------------------------------------------------------
// Mt63Node
// ---------------------------------------------------------------------------

/// A running receive pipeline: microphone → processor thread → consumer.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use mt63_rx::decoder::{DecoderFactory, DecoderLatch};
/// use mt63_rx::pipeline::{Mt63Node, OutboundMessage};
///
/// # fn make_factory() -> Arc<dyn DecoderFactory> { unimplemented!() }
/// let latch = Arc::new(DecoderLatch::new());
/// let node = Mt63Node::spawn(None, latch, make_factory()).unwrap();
///
/// while let Ok(event) = node.events().recv() {
///     match event {
///         OutboundMessage::Decoded(payload) => println!("{payload:?}"),
///         OutboundMessage::Audio { samples, sample_rate } => {
///             println!("{} samples @ {sample_rate} Hz", samples.len());
///         }
///         OutboundMessage::BinaryRequest => { /* deliver the module binary */ }
///     }
/// }
/// ```
pub struct Mt63Node {
    outbound_rx: Receiver<OutboundMessage>,
    control_tx: Sender<ControlMessage>,
    sample_rate: u32,
    thread: JoinHandle<()>,
    /// Keeps the cpal stream alive for the node's lifetime.
    _stream: StreamHandle,
}

impl Mt63Node {
    /// Open the capture device (`device` name, or the system default) and
    /// start the processing thread.
    ///
    /// The processor runs at the device's native sample rate; `latch` and
    /// `factory` wire the decoder initialisation handshake.
    ///
    /// # Errors
    ///
    /// Any [`CaptureError`] from device discovery or stream setup.
    pub fn spawn(
        device: Option<&str>,
        latch: Arc<DecoderLatch>,
        factory: Arc<dyn DecoderFactory>,
    ) -> Result<Self, CaptureError> {
        let capture = AudioCapture::new(device)?;
        let sample_rate = capture.sample_rate();

        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>();
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundMessage>();
        let (control_tx, control_rx) = mpsc::channel::<ControlMessage>();

        let processor = Mt63Processor::new(sample_rate, latch, factory, outbound_tx);

        let thread = std::thread::Builder::new()
            .name("mt63-rx".into())
            .spawn(move || run_processor(processor, block_rx, control_rx))
            .expect("failed to spawn mt63-rx processing thread");

        let stream = capture.start(block_tx)?;
        log::info!(
            "capture started ({} Hz, {} ch)",
            sample_rate,
            capture.channels()
        );

        Ok(Self {
            outbound_rx,
            control_tx,
            sample_rate,
            thread,
            _stream: stream,
        })
    }

    /// Outbound events from the processor, in frame-completion order.
    pub fn events(&self) -> &Receiver<OutboundMessage> {
        &self.outbound_rx
    }

    /// A sender for control messages (binary delivery, shutdown).
    pub fn controls(&self) -> Sender<ControlMessage> {
        self.control_tx.clone()
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Request shutdown and wait for the processing thread to finish.
    ///
    /// Buffered partial frames are discarded.
    pub fn shutdown(self) {
        let _ = self.control_tx.send(ControlMessage::Shutdown);
        if self.thread.join().is_err() {
            log::error!("mt63-rx processing thread panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Processing thread loop
// ---------------------------------------------------------------------------

/// Drive `processor` until shutdown or until the capture side disappears.
///
/// Control messages are drained before every block so a binary delivery or
/// shutdown is observed no later than the next block boundary.
fn run_processor(
    mut processor: Mt63Processor,
    block_rx: Receiver<Vec<f32>>,
    control_rx: Receiver<ControlMessage>,
) {
    log::info!("processing thread started");

    loop {
        while let Ok(msg) = control_rx.try_recv() {
            processor.handle_control(msg);
        }

        match block_rx.recv_timeout(BLOCK_WAIT) {
            Ok(block) => {
                if !processor.process(&block) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if !processor.is_active() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::warn!("capture channel closed; stopping");
                break;
            }
        }
    }

    log::info!("processing thread stopped");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{MockDecoderFactory, MockDecoderModule};
    use crate::pipeline::processor::FRAME_SIZE;

    /// Build a processor plus the channels `run_processor` needs — no audio
    /// hardware involved.
    fn harness() -> (
        Mt63Processor,
        Receiver<OutboundMessage>,
        Sender<ControlMessage>,
        Receiver<ControlMessage>,
    ) {
        let module = Arc::new(MockDecoderModule::new(4 * FRAME_SIZE));
        let factory = Arc::new(MockDecoderFactory::ok(module));
        let latch = Arc::new(DecoderLatch::new());
        let (outbound_tx, outbound_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let processor = Mt63Processor::new(
            48_000,
            latch,
            factory as Arc<dyn DecoderFactory>,
            outbound_tx,
        );
        (processor, outbound_rx, control_tx, control_rx)
    }

    #[test]
    fn loop_processes_queued_blocks_then_stops_on_shutdown() {
        let (processor, outbound_rx, control_tx, control_rx) = harness();
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>();

        // Queue one whole frame and a shutdown before starting the loop.
        for _ in 0..4 {
            block_tx.send(vec![0.5_f32; FRAME_SIZE / 4]).unwrap();
        }
        control_tx.send(ControlMessage::Shutdown).unwrap();

        // Control drains first, so the loop exits promptly; the queued
        // blocks are never flushed into a frame.
        run_processor(processor, block_rx, control_rx);

        let events: Vec<_> = outbound_rx.try_iter().collect();
        // Only the startup request made it out before shutdown.
        assert!(matches!(
            events.as_slice(),
            [OutboundMessage::BinaryRequest]
        ));
    }

    #[test]
    fn loop_emits_audio_for_completed_frames() {
        let (processor, outbound_rx, _control_tx, control_rx) = harness();
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>();

        for _ in 0..4 {
            block_tx.send(vec![0.5_f32; FRAME_SIZE / 4]).unwrap();
        }
        // Closing the capture side ends the loop after the queue drains.
        drop(block_tx);

        run_processor(processor, block_rx, control_rx);

        let events: Vec<_> = outbound_rx.try_iter().collect();
        assert_eq!(events.len(), 2); // BinaryRequest + one Audio frame
        assert!(matches!(events[0], OutboundMessage::BinaryRequest));
        assert!(matches!(events[1], OutboundMessage::Audio { .. }));
    }

    #[test]
    fn loop_exits_on_shutdown_during_silence() {
        let (processor, _outbound_rx, control_tx, control_rx) = harness();
        let (block_tx, block_rx) = mpsc::channel::<Vec<f32>>();

        let worker = std::thread::spawn(move || run_processor(processor, block_rx, control_rx));
        control_tx.send(ControlMessage::Shutdown).unwrap();

        worker.join().expect("loop should exit cleanly");
        drop(block_tx);
    }
}
