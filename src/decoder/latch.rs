//! One-way decoder readiness latch and asynchronous initialisation.
//!
//! Decoder initialisation (decoding the delivered binary and instantiating
//! the module) is slow relative to the audio callback cadence, so it runs on
//! a one-shot background thread.  The processing thread keeps pushing samples
//! through whichever buffer is active and only *reads* the latch at block
//! boundaries; it never waits on the load.
//!
//! [`DecoderLatch`] is that handoff: a single-writer, multi-reader cell that
//! flips ready exactly once and never resets.  Any number of processors can
//! share one latch — the first binary delivery performs the real load, later
//! deliveries are no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;

use super::module::{DecoderFactory, DecoderModule};

// ---------------------------------------------------------------------------
// DecoderLatch
// ---------------------------------------------------------------------------

/// One-way readiness latch holding the shared decoder module handle.
///
/// The module is published only after [`DecoderFactory::load`] returns a
/// fully constructed module, so a reader either sees nothing or sees a module
/// that is safe to use — never a half-initialised one.
#[derive(Default)]
pub struct DecoderLatch {
    module: OnceLock<Arc<dyn DecoderModule>>,
    /// Set while a load is in flight; cleared when it finishes either way.
    loading: AtomicBool,
}

impl DecoderLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` once a module has been published.  Lock-free; safe to call on
    /// every audio block.
    pub fn is_ready(&self) -> bool {
        self.module.get().is_some()
    }

    /// The published module, if any.
    pub fn get(&self) -> Option<&Arc<dyn DecoderModule>> {
        self.module.get()
    }

    /// Publish an already-constructed module.
    ///
    /// Returns `false` (and drops `module`) when the latch is already ready —
    /// the flip is one-way.
    pub fn install(&self, module: Arc<dyn DecoderModule>) -> bool {
        self.module.set(module).is_ok()
    }

    /// Load `binary` through `factory` on a background thread and publish the
    /// module on success.
    ///
    /// Returns `None` without spawning when the latch is already ready or a
    /// load is already in flight — at most one real initialisation ever runs.
    /// A failed load logs a warning and clears the in-flight flag so a fresh
    /// binary delivery may try again; there is no automatic retry.
    ///
    /// The returned [`JoinHandle`] is only needed by tests that want to wait
    /// for the load deterministically; production callers drop it.
    pub fn install_async(
        self: &Arc<Self>,
        factory: Arc<dyn DecoderFactory>,
        binary: Vec<u8>,
    ) -> Option<JoinHandle<()>> {
        if self.is_ready() {
            log::debug!("decoder already initialised; ignoring binary delivery");
            return None;
        }
        if self.loading.swap(true, Ordering::SeqCst) {
            log::debug!("decoder initialisation already in flight; ignoring binary delivery");
            return None;
        }

        let latch = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("decoder-init".into())
            .spawn(move || {
                log::debug!("loading decoder module ({} bytes)", binary.len());
                match factory.load(&binary) {
                    Ok(module) => {
                        if latch.install(module) {
                            log::info!("decoder module ready");
                        }
                    }
                    Err(e) => {
                        log::warn!("decoder initialisation failed: {e}");
                    }
                }
                latch.loading.store(false, Ordering::SeqCst);
            })
            .expect("failed to spawn decoder-init thread");

        Some(handle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::module::{DecoderError, MockDecoderFactory, MockDecoderModule};

    fn ok_factory() -> (Arc<MockDecoderModule>, Arc<MockDecoderFactory>) {
        let module = Arc::new(MockDecoderModule::new(64));
        let factory = Arc::new(MockDecoderFactory::ok(Arc::clone(&module)));
        (module, factory)
    }

    // ---- install -----------------------------------------------------------

    #[test]
    fn starts_not_ready() {
        let latch = DecoderLatch::new();
        assert!(!latch.is_ready());
        assert!(latch.get().is_none());
    }

    #[test]
    fn install_flips_ready_once() {
        let latch = DecoderLatch::new();
        let (module, _) = ok_factory();

        assert!(latch.install(Arc::clone(&module) as Arc<dyn DecoderModule>));
        assert!(latch.is_ready());
        // Second install is rejected; the latch never resets.
        assert!(!latch.install(module as Arc<dyn DecoderModule>));
    }

    // ---- install_async -----------------------------------------------------

    #[test]
    fn async_load_publishes_module() {
        let latch = Arc::new(DecoderLatch::new());
        let (_, factory) = ok_factory();

        let handle = latch
            .install_async(factory.clone() as Arc<dyn DecoderFactory>, vec![0u8; 4])
            .expect("load should start");
        handle.join().unwrap();

        assert!(latch.is_ready());
        assert_eq!(factory.load_count(), 1);
    }

    #[test]
    fn second_delivery_after_ready_is_a_noop() {
        let latch = Arc::new(DecoderLatch::new());
        let (_, factory) = ok_factory();

        latch
            .install_async(factory.clone() as Arc<dyn DecoderFactory>, vec![1])
            .unwrap()
            .join()
            .unwrap();
        // Already ready — no thread spawned, no second factory load.
        assert!(latch
            .install_async(factory.clone() as Arc<dyn DecoderFactory>, vec![2])
            .is_none());
        assert_eq!(factory.load_count(), 1);
    }

    #[test]
    fn failed_load_leaves_latch_unready_and_allows_retry() {
        let latch = Arc::new(DecoderLatch::new());
        let bad: Arc<dyn DecoderFactory> = Arc::new(MockDecoderFactory::err(
            DecoderError::InvalidBinary("truncated".into()),
        ));

        latch
            .install_async(Arc::clone(&bad), vec![0])
            .unwrap()
            .join()
            .unwrap();
        assert!(!latch.is_ready());

        // A fresh delivery retries and can succeed.
        let (_, good) = ok_factory();
        latch
            .install_async(good as Arc<dyn DecoderFactory>, vec![0])
            .unwrap()
            .join()
            .unwrap();
        assert!(latch.is_ready());
    }

    #[test]
    fn delivery_while_load_in_flight_is_a_noop() {
        let latch = Arc::new(DecoderLatch::new());
        let (_, factory) = ok_factory();

        // Mark a load as in flight by hand, then deliver.
        latch.loading.store(true, Ordering::SeqCst);
        assert!(latch
            .install_async(factory.clone() as Arc<dyn DecoderFactory>, vec![0])
            .is_none());
        assert_eq!(factory.load_count(), 0);

        latch.loading.store(false, Ordering::SeqCst);
        assert!(latch
            .install_async(factory as Arc<dyn DecoderFactory>, vec![0])
            .is_some());
    }
}
