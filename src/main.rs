//! Application entry point — MT63 receive monitor.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`RxConfig`] from disk (returns default on first run).
//! 3. Spawn the receive pipeline ([`Mt63Node`]).
//! 4. Consume outbound events until the pipeline stops:
//!    - `BinaryRequest` → read the configured decoder binary and deliver it.
//!    - `Decoded`       → print the decoded payload.
//!    - `Audio`         → count fallback frames, log throughput periodically.
//!
//! This build links no decoder engine, so a delivered binary fails
//! initialisation and the monitor runs the fallback path — the decoded-text
//! path lights up only in builds that plug a real [`DecoderFactory`] in.

use std::sync::Arc;

use mt63_rx::config::RxConfig;
use mt63_rx::decoder::{DecoderError, DecoderFactory, DecoderLatch, DecoderModule};
use mt63_rx::pipeline::{ControlMessage, Mt63Node, OutboundMessage};

/// Log fallback throughput every this many audio frames (~20 s at 48 kHz).
const AUDIO_LOG_INTERVAL: u64 = 400;

// ---------------------------------------------------------------------------
// UnlinkedFactory — DecoderFactory when no engine is compiled in
// ---------------------------------------------------------------------------

/// Stub factory used when the build carries no decoder engine, so the
/// pipeline still launches and degrades gracefully to the fallback path.
struct UnlinkedFactory;

impl DecoderFactory for UnlinkedFactory {
    fn load(&self, _binary: &[u8]) -> Result<Arc<dyn DecoderModule>, DecoderError> {
        Err(DecoderError::Unavailable(
            "no decoder engine linked into this build".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("MT63 receive monitor starting up");

    // 2. Configuration
    let config = RxConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        RxConfig::default()
    });

    // 3. Pipeline
    let latch = Arc::new(DecoderLatch::new());
    let node = Mt63Node::spawn(
        config.audio.device.as_deref(),
        latch,
        Arc::new(UnlinkedFactory),
    )?;
    log::info!("pipeline running at {} Hz", node.sample_rate());

    let controls = node.controls();
    let mut audio_frames: u64 = 0;
    let mut audio_samples: u64 = 0;

    // 4. Event loop — runs until the processing thread stops.
    while let Ok(event) = node.events().recv() {
        match event {
            OutboundMessage::BinaryRequest => {
                deliver_binary(&config, &controls);
            }
            OutboundMessage::Decoded(payload) => {
                println!("{}", String::from_utf8_lossy(&payload));
            }
            OutboundMessage::Audio { samples, sample_rate } => {
                audio_frames += 1;
                audio_samples += samples.len() as u64;
                if audio_frames % AUDIO_LOG_INTERVAL == 0 {
                    log::info!(
                        "fallback path: {audio_frames} frames ({audio_samples} samples @ {sample_rate} Hz) forwarded"
                    );
                }
            }
        }
    }

    log::info!("pipeline stopped");
    Ok(())
}

/// Answer the startup handshake with the configured decoder binary, if any.
fn deliver_binary(config: &RxConfig, controls: &std::sync::mpsc::Sender<ControlMessage>) {
    let Some(path) = &config.decoder.binary_path else {
        log::warn!("no decoder binary configured; running the fallback path");
        return;
    };

    match std::fs::read(path) {
        Ok(binary) => {
            log::info!("delivering decoder binary: {} ({} bytes)", path.display(), binary.len());
            let _ = controls.send(ControlMessage::Binary(binary));
        }
        Err(e) => {
            log::warn!(
                "could not read decoder binary {} ({e}); running the fallback path",
                path.display()
            );
        }
    }
}
