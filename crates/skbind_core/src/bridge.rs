//! Native callback bridging
//!
//! Native objects that call back into Rust (callback canvases, change
//! listeners) are created with an opaque context pointer. The pointer is a
//! [`ContextToken`]: a serial number keying a per-family [`ContextTable`]
//! that holds a weak reference to the proxy. A token that has been released, or
//! whose proxy has died, simply fails to resolve, so a late callback can
//! never reach freed memory.
//!
//! # Lifecycle
//!
//! ```text
//! Constructed ──► Active ──► UserDisposed ───┐
//!                        └─► NativeDestroyed ─┴─► TornDown
//! ```
//!
//! The native destructor of every bridged object invokes a destroy proc. The
//! destroy trampoline ([`dispatch_destroy`]) marks the instance as destroyed
//! natively before disposing it, so its `dispose_native` skips the native
//! destroy call, and releases the token once the proxy is torn down. When
//! the destruction started from the Rust side the proxy is already disposed
//! and the trampoline only releases the token.
//!
//! Trampolines run on native stacks: nothing may unwind out of them. Panics
//! raised by user callbacks are caught and logged.

use crate::error::Result;
use crate::handle::Handle;
use crate::object::{NativeKind, NativeWrapper, Proxy};
use crate::registry::{Acquired, HandleRegistry};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::collections::hash_map;
use std::ffi::c_void;
use std::num::NonZeroUsize;
use std::ops::Deref;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once, OnceLock, PoisonError, Weak};

/// The context pointer handed to native code.
///
/// A token is a pointer-sized serial, unique within its table. Released
/// serials are not handed out again until the counter wraps, so a stale
/// pointer cannot name a newer instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextToken(NonZeroUsize);

impl ContextToken {
    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }
}

struct Slots<T: ?Sized> {
    last: usize,
    live: FxHashMap<usize, Weak<T>>,
}

/// Weak references to the live instances of one bridged family.
pub struct ContextTable<T: ?Sized> {
    slots: OnceLock<Mutex<Slots<T>>>,
}

impl<T: ?Sized + Send + Sync + 'static> ContextTable<T> {
    pub const fn new() -> Self {
        Self { slots: OnceLock::new() }
    }

    fn slots(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots
            .get_or_init(|| {
                Mutex::new(Slots {
                    last: 0,
                    live: FxHashMap::default(),
                })
            })
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create(&self, target: Weak<T>) -> ContextToken {
        let mut slots = self.slots();
        loop {
            slots.last = slots.last.wrapping_add(1);
            let Some(serial) = NonZeroUsize::new(slots.last) else {
                continue;
            };
            // After a wrap, serials still in use are skipped.
            if let hash_map::Entry::Vacant(vacant) = slots.live.entry(serial.get()) {
                vacant.insert(target);
                return ContextToken(serial);
            }
        }
    }

    /// The instance behind `token`, if the token is current and the instance alive.
    pub fn resolve(&self, token: ContextToken) -> Option<Arc<T>> {
        let weak = self.slots().live.get(&token.0.get())?.clone();
        weak.upgrade()
    }

    /// Frees the slot. Releasing a stale token is a no-op.
    pub fn release(&self, token: ContextToken) -> bool {
        let removed = self.slots().live.remove(&token.0.get());
        removed.is_some()
    }

    pub fn contains(&self, token: ContextToken) -> bool {
        self.slots().live.contains_key(&token.0.get())
    }

    pub fn len(&self) -> usize {
        self.slots().live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-instance bridge state, embedded in a bridged kind.
#[derive(Debug)]
pub struct NativeBridge {
    token: ContextToken,
    destroyed_natively: AtomicBool,
}

impl NativeBridge {
    pub fn new(token: ContextToken) -> Self {
        Self {
            token,
            destroyed_natively: AtomicBool::new(false),
        }
    }

    pub fn token(&self) -> ContextToken {
        self.token
    }

    pub fn context(&self) -> *mut c_void {
        self.token.as_ptr()
    }

    pub fn mark_destroyed_natively(&self) {
        self.destroyed_natively.store(true, Ordering::Release);
    }

    /// Whether native code destroyed the object, making a native destroy
    /// call from the proxy redundant.
    pub fn destroyed_natively(&self) -> bool {
        self.destroyed_natively.load(Ordering::Acquire)
    }
}

/// What the destroy trampoline needs from a bridged instance.
pub trait BridgeTarget: Send + Sync {
    fn bridge(&self) -> &NativeBridge;

    fn dispose_internal(&self);
}

/// A kind that embeds a [`NativeBridge`].
pub trait BridgedKind: NativeKind {
    fn bridge(&self) -> &NativeBridge;
}

impl<K: BridgedKind> BridgeTarget for Proxy<K> {
    fn bridge(&self) -> &NativeBridge {
        self.kind().bridge()
    }

    fn dispose_internal(&self) {
        Proxy::dispose_internal(self);
    }
}

/// One-time registration of a family's native procs.
pub struct ProcTable {
    once: Once,
}

impl ProcTable {
    pub const fn new() -> Self {
        Self { once: Once::new() }
    }

    /// Runs `register` the first time it is called, before any instance of
    /// the family is constructed.
    pub fn ensure(&self, family: &'static str, register: impl FnOnce()) {
        self.once.call_once(|| {
            tracing::debug!(target: "skbind::bridge", family, "registering native procs");
            register();
        });
    }

    pub fn is_registered(&self) -> bool {
        self.once.is_completed()
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Resolves `context` and runs `f` on the instance.
///
/// A stale context or a panic inside `f` is logged and swallowed.
pub fn dispatch<T: ?Sized + Send + Sync + 'static>(
    table: &ContextTable<T>,
    context: *mut c_void,
    callback: &'static str,
    f: impl FnOnce(&T),
) {
    let Some(token) = ContextToken::from_ptr(context) else {
        tracing::warn!(target: "skbind::bridge", callback, "callback without a context");
        return;
    };
    let Some(target) = table.resolve(token) else {
        tracing::warn!(target: "skbind::bridge", callback, "stale context, callback dropped");
        return;
    };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| f(&target))) {
        tracing::error!(target: "skbind::bridge", callback, message = panic_message(payload.as_ref()), "callback panicked");
    }
}

/// The destroy trampoline body shared by every bridged family.
///
/// Marks the instance as destroyed natively, disposes it, and releases the
/// token afterwards whether or not the instance was still alive.
pub fn dispatch_destroy<T: ?Sized + BridgeTarget + 'static>(table: &ContextTable<T>, context: *mut c_void) {
    let Some(token) = ContextToken::from_ptr(context) else {
        return;
    };
    match table.resolve(token) {
        Some(target) => {
            let result = catch_unwind(AssertUnwindSafe(|| {
                target.bridge().mark_destroyed_natively();
                target.dispose_internal();
            }));
            if let Err(payload) = result {
                tracing::error!(target: "skbind::bridge", message = panic_message(payload.as_ref()), "dispose from native destroy panicked");
            }
        }
        None => tracing::trace!(target: "skbind::bridge", "destroy for an instance that is already gone"),
    }
    table.release(token);
}

// =============================================================================
// Borrowed callback arguments
// =============================================================================

/// An object native code passed to a callback.
///
/// Existing proxies are reused. A proxy created just for the callback does
/// not own the handle and is disposed when the guard drops, so it never
/// outlives the call.
pub struct Borrowed<W: NativeWrapper> {
    wrapper: W,
    dispose_on_drop: bool,
}

impl<W: NativeWrapper> Borrowed<W> {
    pub fn from_native(
        handle: Handle,
        factory: impl FnOnce(Handle, bool) -> Result<W::Kind>,
    ) -> Result<Option<Self>> {
        let acquired = HandleRegistry::global().get_or_add_with_status(handle, false, false, factory)?;
        Ok(acquired.map(|(proxy, how)| Self {
            wrapper: W::from_proxy(proxy),
            dispose_on_drop: how == Acquired::Created,
        }))
    }

    /// Whether the proxy was created for this callback.
    pub fn is_temporary(&self) -> bool {
        self.dispose_on_drop
    }
}

impl<W: NativeWrapper> Deref for Borrowed<W> {
    type Target = W;

    fn deref(&self) -> &W {
        &self.wrapper
    }
}

impl<W: NativeWrapper> Drop for Borrowed<W> {
    fn drop(&mut self) {
        if self.dispose_on_drop {
            self.wrapper.proxy().dispose_internal();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Target {
        name: &'static str,
    }

    #[test]
    fn test_token_round_trip() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let token = table.create(Arc::downgrade(&target));
        let back = ContextToken::from_ptr(token.as_ptr()).unwrap();
        assert_eq!(back, token);
        assert_eq!(table.resolve(back).unwrap().name, "a");
    }

    #[test]
    fn test_released_token_does_not_resolve() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let token = table.create(Arc::downgrade(&target));
        assert!(table.release(token));
        assert!(table.resolve(token).is_none());
        assert!(!table.release(token));

        // A new instance is not reachable through the old token.
        let other = Arc::new(Target { name: "b" });
        let fresh = table.create(Arc::downgrade(&other));
        assert_ne!(fresh, token);
        assert!(table.resolve(token).is_none());
        assert_eq!(table.resolve(fresh).unwrap().name, "b");
    }

    #[test]
    fn test_recycled_slots_keep_old_tokens_stale() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let mut released = Vec::new();
        for _ in 0..100_000 {
            let token = table.create(Arc::downgrade(&target));
            let back = ContextToken::from_ptr(token.as_ptr()).unwrap();
            assert_eq!(back, token);
            assert!(table.resolve(back).is_some());
            assert!(table.release(token));
            if released.len() < 64 {
                released.push(token);
            }
        }
        let current = table.create(Arc::downgrade(&target));
        for stale in released {
            assert!(table.resolve(ContextToken::from_ptr(stale.as_ptr()).unwrap()).is_none());
        }
        assert_eq!(table.len(), 1);
        assert!(table.resolve(current).is_some());
    }

    #[test]
    fn test_wrapped_counter_skips_null_and_live_tokens() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let first = table.create(Arc::downgrade(&target));
        table.slots().last = usize::MAX - 1;
        let high = table.create(Arc::downgrade(&target));
        assert_eq!(high.as_ptr() as usize, usize::MAX);
        let wrapped = table.create(Arc::downgrade(&target));
        assert_ne!(wrapped, first);
        assert_eq!(wrapped.as_ptr() as usize, first.as_ptr() as usize + 1);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_dead_target_does_not_resolve() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let token = table.create(Arc::downgrade(&target));
        drop(target);
        assert!(table.resolve(token).is_none());
        assert!(table.contains(token));
    }

    #[test]
    fn test_dispatch_swallows_panics_and_stale_tokens() {
        let table: ContextTable<Target> = ContextTable::new();
        let target = Arc::new(Target { name: "a" });
        let token = table.create(Arc::downgrade(&target));
        dispatch(&table, token.as_ptr(), "test", |_| panic!("boom"));
        table.release(token);
        let mut called = false;
        dispatch(&table, token.as_ptr(), "test", |_| called = true);
        assert!(!called);
        dispatch(&table, std::ptr::null_mut(), "test", |_| called = true);
        assert!(!called);
    }

    #[test]
    fn test_proc_table_runs_once() {
        let procs = ProcTable::new();
        let mut runs = 0;
        procs.ensure("test", || runs += 1);
        procs.ensure("test", || runs += 1);
        assert_eq!(runs, 1);
        assert!(procs.is_registered());
    }
}
