//! Integration tests for native callback bridging

mod common;

use common::{fresh_handle, init_tracing, Counters, Tracked};
use skbind_core::{
    dispatch, dispatch_destroy, Borrowed, BridgeTarget, BridgedKind, ContextTable, Handle, NativeBridge, NativeKind,
    NativeWrapper, ProcTable, Proxy,
};
use std::ffi::c_void;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier, Weak};
use std::thread;

trait ChangeTarget: BridgeTarget {
    fn changed(&self);
}

static LISTENERS: ContextTable<dyn ChangeTarget> = ContextTable::new();
static LISTENER_PROCS: ProcTable = ProcTable::new();

struct Listener {
    bridge: NativeBridge,
    counters: Arc<Counters>,
    changes: AtomicU32,
}

impl NativeKind for Listener {
    const TYPE_NAME: &'static str = "Listener";
    const REGISTERED: bool = false;

    fn dispose_native(&self, _handle: Handle) {
        if !self.bridge.destroyed_natively() {
            self.counters.native_destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn dispose_managed(&self) {
        self.counters.managed_cleanups.fetch_add(1, Ordering::SeqCst);
    }
}

impl BridgedKind for Listener {
    fn bridge(&self) -> &NativeBridge {
        &self.bridge
    }
}

impl ChangeTarget for Proxy<Listener> {
    fn changed(&self) {
        self.kind().changes.fetch_add(1, Ordering::SeqCst);
    }
}

fn listener() -> (Arc<Proxy<Listener>>, Arc<Counters>) {
    LISTENER_PROCS.ensure("Listener", || {});
    let counters = Arc::new(Counters::default());
    let proxy = Proxy::new_cyclic(true, |weak| {
        let target: Weak<dyn ChangeTarget> = weak.clone();
        Listener {
            bridge: NativeBridge::new(LISTENERS.create(target)),
            counters: Arc::clone(&counters),
            changes: AtomicU32::new(0),
        }
    });
    proxy.assign_handle(fresh_handle()).unwrap();
    (proxy, counters)
}

fn changed(context: *mut std::ffi::c_void) {
    dispatch(&LISTENERS, context, "changed", |target| target.changed());
}

#[test]
fn test_callbacks_reach_the_instance() {
    init_tracing();
    let (proxy, _) = listener();
    let context = proxy.kind().bridge().context();
    changed(context);
    changed(context);
    assert_eq!(proxy.kind().changes.load(Ordering::SeqCst), 2);
    assert!(LISTENER_PROCS.is_registered());
}

#[test]
fn test_native_destroy_skips_native_call() {
    init_tracing();
    let (proxy, counters) = listener();
    let token = proxy.kind().bridge().token();

    dispatch_destroy(&LISTENERS, token.as_ptr());

    assert!(proxy.is_disposed());
    assert!(proxy.kind().bridge().destroyed_natively());
    assert_eq!(counters.destroys(), 0);
    assert_eq!(counters.cleanups(), 1);
    assert!(!LISTENERS.contains(token));

    // A second signal for the same context is stale and changes nothing.
    dispatch_destroy(&LISTENERS, token.as_ptr());
    changed(token.as_ptr());
    assert_eq!(counters.cleanups(), 1);
    assert_eq!(proxy.kind().changes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_user_dispose_then_native_destroy() {
    init_tracing();
    let (proxy, counters) = listener();
    let token = proxy.kind().bridge().token();

    proxy.dispose();
    assert_eq!(counters.destroys(), 1);
    assert!(LISTENERS.contains(token));

    // The native destructor reports back; teardown does not run again.
    dispatch_destroy(&LISTENERS, token.as_ptr());
    assert_eq!(counters.destroys(), 1);
    assert_eq!(counters.cleanups(), 1);
    assert!(!LISTENERS.contains(token));
}

#[test]
fn test_callback_after_drop_is_ignored() {
    init_tracing();
    let (proxy, counters) = listener();
    let token = proxy.kind().bridge().token();
    drop(proxy);
    assert_eq!(counters.destroys(), 1);

    changed(token.as_ptr());
    dispatch_destroy(&LISTENERS, token.as_ptr());
    assert!(!LISTENERS.contains(token));
}

#[test]
fn test_panicking_callback_is_contained() {
    init_tracing();
    let (proxy, _) = listener();
    dispatch(&LISTENERS, proxy.kind().bridge().context(), "changed", |_| {
        panic!("listener failed")
    });
    changed(proxy.kind().bridge().context());
    assert_eq!(proxy.kind().changes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_racing_callbacks_and_teardown_tear_down_once() {
    init_tracing();
    for round in 0..200 {
        let (proxy, counters) = listener();
        let token = proxy.kind().bridge().token();
        let context = token.as_ptr() as usize;
        let weak = Arc::downgrade(&proxy);
        let barrier = Barrier::new(4);
        let user_disposes = round % 2 == 0;

        thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    barrier.wait();
                    for _ in 0..50 {
                        changed(context as *mut c_void);
                    }
                });
            }
            scope.spawn(|| {
                barrier.wait();
                dispatch_destroy(&LISTENERS, context as *mut c_void);
            });
            // Disposes, or drops the last strong reference.
            let barrier = &barrier;
            scope.spawn(move || {
                barrier.wait();
                if user_disposes {
                    proxy.dispose();
                }
                drop(proxy);
            });
        });

        assert!(weak.upgrade().is_none());
        assert!(counters.destroys() <= 1);
        assert!(counters.cleanups() <= 1);
        if user_disposes {
            assert_eq!(counters.cleanups(), 1);
        }
        assert!(!LISTENERS.contains(token));
        assert!(LISTENERS.resolve(token).is_none());
    }
}

// =============================================================================
// Borrowed arguments
// =============================================================================

struct TrackedRef(Arc<Proxy<Tracked>>);

impl NativeWrapper for TrackedRef {
    type Kind = Tracked;

    fn from_proxy(proxy: Arc<Proxy<Tracked>>) -> Self {
        Self(proxy)
    }

    fn proxy(&self) -> &Arc<Proxy<Tracked>> {
        &self.0
    }
}

#[test]
fn test_borrowed_reuses_existing_proxy() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let handle = fresh_handle();
    let existing = Proxy::new(handle, true, Tracked::new(&counters)).unwrap();

    let borrowed = Borrowed::<TrackedRef>::from_native(handle, |_, _| Ok(Tracked::new(&counters)))
        .unwrap()
        .unwrap();
    assert!(!borrowed.is_temporary());
    assert!(Arc::ptr_eq(borrowed.proxy(), &existing));
    drop(borrowed);

    assert!(!existing.is_disposed());
    assert_eq!(counters.destroys(), 0);
}

#[test]
fn test_borrowed_temporary_proxy_is_disposed_without_destroy() {
    init_tracing();
    let counters = Arc::new(Counters::default());
    let handle = fresh_handle();

    let borrowed = Borrowed::<TrackedRef>::from_native(handle, |_, _| Ok(Tracked::new(&counters)))
        .unwrap()
        .unwrap();
    assert!(borrowed.is_temporary());
    assert!(!borrowed.owns_handle());
    let proxy = Arc::clone(borrowed.proxy());
    drop(borrowed);

    assert!(proxy.is_disposed());
    assert_eq!(counters.destroys(), 0);
}

#[test]
fn test_borrowed_null_handle() {
    init_tracing();
    let borrowed = Borrowed::<TrackedRef>::from_native(Handle::NULL, |_, _| unreachable!()).unwrap();
    assert!(borrowed.is_none());
}
