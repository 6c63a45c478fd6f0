//! Shared helpers for integration tests

#![allow(dead_code)]

use skbind_core::{Handle, NativeKind};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(0x7000_0000);

/// A handle value no other test in this binary uses.
pub fn fresh_handle() -> Handle {
    Handle::from_raw(NEXT_HANDLE.fetch_add(0x10, Ordering::Relaxed))
}

/// Counts native destroys and managed cleanups.
#[derive(Default)]
pub struct Counters {
    pub native_destroys: AtomicU32,
    pub managed_cleanups: AtomicU32,
}

impl Counters {
    pub fn destroys(&self) -> u32 {
        self.native_destroys.load(Ordering::SeqCst)
    }

    pub fn cleanups(&self) -> u32 {
        self.managed_cleanups.load(Ordering::SeqCst)
    }
}

/// A kind backed by no native object at all.
pub struct Tracked {
    pub counters: Arc<Counters>,
}

impl Tracked {
    pub fn new(counters: &Arc<Counters>) -> Self {
        Self {
            counters: Arc::clone(counters),
        }
    }
}

impl NativeKind for Tracked {
    const TYPE_NAME: &'static str = "Tracked";

    fn dispose_native(&self, _handle: Handle) {
        self.counters.native_destroys.fetch_add(1, Ordering::SeqCst);
    }

    fn dispose_managed(&self) {
        self.counters.managed_cleanups.fetch_add(1, Ordering::SeqCst);
    }
}
