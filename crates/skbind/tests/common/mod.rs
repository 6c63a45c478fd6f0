//! Shared helpers for wrapper integration tests

#![allow(dead_code)]

use skbind::Handle;
use skbind_native::{debug, sk_nvrefcnt_get_ref_count, sk_nvrefcnt_t, sk_refcnt_get_ref_count, sk_refcnt_t};
use std::sync::Once;

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

/// Native reference count of a virtually ref-counted object, 0 once freed.
pub fn ref_count(handle: Handle) -> i32 {
    // SAFETY: the native layer checks liveness before reading.
    unsafe { sk_refcnt_get_ref_count(handle.as_ptr::<sk_refcnt_t>()) }
}

/// Native reference count of vertices, 0 once freed.
pub fn nv_ref_count(handle: Handle) -> i32 {
    // SAFETY: as above.
    unsafe { sk_nvrefcnt_get_ref_count(handle.as_ptr::<sk_nvrefcnt_t>()) }
}

/// Identifies the native object currently at `handle`, so its destroys can be
/// counted even after the address is reused.
pub fn object_id(handle: Handle) -> u64 {
    debug::object_id(handle.raw()).expect("handle refers to a live native object")
}

pub fn destroys(id: u64) -> u32 {
    debug::destroy_count(id)
}
