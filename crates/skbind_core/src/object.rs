//! Proxies and the disposal state machine
//!
//! A [`Proxy`] is the managed side of one native object. It is always handed
//! out as an `Arc`, and dropping the last `Arc` finalizes it.
//!
//! # Disposal
//!
//! Disposal runs at most once, guarded by a compare-and-swap on the proxy
//! state (`Live → Disposing → Disposed`). Explicit disposal tears down in four
//! steps:
//!
//! 1. dispose owned children that do not own their handle,
//! 2. destroy the native object, if the handle is set and owned,
//! 3. dispose owned children that own their handle, then clear the owned and
//!    keep-alive maps,
//! 4. deregister and clear the handle.
//!
//! Finalization (drop without a prior dispose) runs steps 2 and 4 only. The
//! child maps are dropped with the proxy, so children follow their own
//! finalizers.
//!
//! # Ownership graph
//!
//! Each proxy has two lazily created maps keyed by child handle:
//!
//! - **owned** children are torn down with their parent,
//! - **kept-alive** children are only guaranteed to outlive the parent.
//!
//! Both hold strong references. A cycle between proxies is broken by an
//! explicit dispose of any member, never by finalization.

use crate::alloc_log::{self, Phase};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::registry::HandleRegistry;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposeState {
    Live,
    Disposing,
    Disposed,
}

/// Native-side behavior of one wrapped type.
///
/// Implementations are usually zero-sized; bridged types carry their
/// callback state here.
pub trait NativeKind: Send + Sync + Sized + 'static {
    const TYPE_NAME: &'static str;

    /// Whether proxies of this kind take part in handle deduplication.
    const REGISTERED: bool = true;

    /// Destroys or releases the native object. Called at most once per proxy,
    /// and only while the proxy owns the handle.
    fn dispose_native(&self, handle: Handle);

    /// Releases a reference the caller received for an object that already
    /// has a proxy. A no-op for kinds that are not reference-counted.
    fn release_redundant_ref(_handle: Handle) {}

    /// Managed cleanup that must run before the native object is destroyed.
    fn dispose_unowned_managed(&self) {}

    /// Managed cleanup that runs after the native object is destroyed.
    fn dispose_managed(&self) {}
}

/// Object-safe view of any proxy, used for ownership graphs and the registry.
pub trait ManagedObject: Send + Sync + 'static {
    fn core(&self) -> &ObjectCore;

    fn type_name(&self) -> &'static str;

    /// Disposes regardless of the ignore-public-dispose flag.
    fn dispose_internal(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

    fn handle(&self) -> Handle {
        self.core().handle()
    }

    fn owns_handle(&self) -> bool {
        self.core().owns_handle()
    }

    fn is_disposed(&self) -> bool {
        self.core().is_disposed()
    }

    /// Public dispose: a no-op once ownership has moved elsewhere.
    fn dispose(&self) {
        if self.core().ignores_public_dispose() {
            tracing::debug!(target: "skbind::object", type_name = self.type_name(), "ignoring public dispose");
            return;
        }
        self.dispose_internal();
    }
}

type Children = FxHashMap<Handle, Arc<dyn ManagedObject>>;
type Snapshot = SmallVec<[Arc<dyn ManagedObject>; 8]>;

fn lock(children: &Mutex<Children>) -> MutexGuard<'_, Children> {
    children.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by every proxy: handle, flags, disposal state and children.
pub struct ObjectCore {
    handle: AtomicUsize,
    owns_handle: AtomicBool,
    ignore_public_dispose: AtomicBool,
    state: AtomicU8,
    owned: OnceLock<Mutex<Children>>,
    keep_alive: OnceLock<Mutex<Children>>,
    alloc_site: Option<Arc<str>>,
}

impl ObjectCore {
    fn new(handle: Handle, owns_handle: bool, alloc_site: Option<Arc<str>>) -> Self {
        Self {
            handle: AtomicUsize::new(handle.raw()),
            owns_handle: AtomicBool::new(owns_handle),
            ignore_public_dispose: AtomicBool::new(false),
            state: AtomicU8::new(LIVE),
            owned: OnceLock::new(),
            keep_alive: OnceLock::new(),
            alloc_site,
        }
    }

    pub fn handle(&self) -> Handle {
        Handle::from_raw(self.handle.load(Ordering::Acquire))
    }

    pub fn owns_handle(&self) -> bool {
        self.owns_handle.load(Ordering::Acquire)
    }

    pub fn ignores_public_dispose(&self) -> bool {
        self.ignore_public_dispose.load(Ordering::Acquire)
    }

    pub fn state(&self) -> DisposeState {
        match self.state.load(Ordering::Acquire) {
            LIVE => DisposeState::Live,
            DISPOSING => DisposeState::Disposing,
            _ => DisposeState::Disposed,
        }
    }

    /// `true` once disposal has started.
    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) != LIVE
    }

    /// Makes public dispose a no-op without changing ownership.
    pub fn prevent_public_disposal(&self) {
        self.ignore_public_dispose.store(true, Ordering::Release);
    }

    /// Where the proxy was constructed, when allocation logging was on.
    pub fn alloc_site(&self) -> Option<&str> {
        self.alloc_site.as_deref()
    }

    /// Clears `owns_handle` if it is set. Of several concurrent callers
    /// exactly one sees `true`, and only that one may hand the handle on.
    pub fn try_revoke_ownership(&self) -> bool {
        self.owns_handle
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_owns_handle(&self, owns: bool) {
        self.owns_handle.store(owns, Ordering::Release);
    }

    fn begin_dispose(&self) -> bool {
        self.state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn finish_dispose(&self) {
        self.state.store(DISPOSED, Ordering::Release);
    }

    // =========================================================================
    // Ownership graph
    // =========================================================================

    /// Makes `child` part of this object: it is disposed with this object if
    /// it owns its handle, and detached otherwise.
    pub fn adopt_owned_child(&self, child: Arc<dyn ManagedObject>) {
        insert_child(&self.owned, child, "owned");
    }

    /// The owned child under `handle`, creating and adopting one with
    /// `create` if there is none. Used for views that are cached per owner.
    pub fn owned_child_or_adopt(
        &self,
        handle: Handle,
        create: impl FnOnce() -> Result<Arc<dyn ManagedObject>>,
    ) -> Result<Arc<dyn ManagedObject>> {
        let mut children = lock(self.owned.get_or_init(Default::default));
        if let Some(child) = children.get(&handle) {
            return Ok(Arc::clone(child));
        }
        let child = create()?;
        children.insert(handle, Arc::clone(&child));
        Ok(child)
    }

    /// Drops owned children that have already been disposed, returning how
    /// many were released.
    pub fn release_disposed_owned(&self) -> usize {
        let Some(children) = self.owned.get() else {
            return 0;
        };
        let released: Snapshot = {
            let mut children = lock(children);
            let disposed: SmallVec<[Handle; 8]> = children
                .iter()
                .filter(|(_, child)| child.is_disposed())
                .map(|(handle, _)| *handle)
                .collect();
            disposed.iter().filter_map(|handle| children.remove(handle)).collect()
        };
        released.len()
    }

    /// Keeps `child` alive at least as long as this object.
    pub fn pin_kept_alive(&self, child: Arc<dyn ManagedObject>) {
        insert_child(&self.keep_alive, child, "kept-alive");
    }

    /// Drops the keep-alive pin for `handle`, returning the child it held.
    pub fn unpin_kept_alive(&self, handle: Handle) -> Option<Arc<dyn ManagedObject>> {
        let children = self.keep_alive.get()?;
        let removed = lock(children).remove(&handle);
        removed
    }

    /// Drops every keep-alive pin, returning how many there were.
    pub fn clear_kept_alive(&self) -> usize {
        let Some(children) = self.keep_alive.get() else {
            return 0;
        };
        let released: Snapshot = lock(children).drain().map(|(_, child)| child).collect();
        released.len()
    }

    pub fn owned_count(&self) -> usize {
        self.owned.get().map_or(0, |children| lock(children).len())
    }

    pub fn kept_alive_count(&self) -> usize {
        self.keep_alive.get().map_or(0, |children| lock(children).len())
    }

    pub fn has_owned_child(&self, handle: Handle) -> bool {
        self.owned
            .get()
            .map_or(false, |children| lock(children).contains_key(&handle))
    }

    pub fn keeps_alive(&self, handle: Handle) -> bool {
        self.keep_alive
            .get()
            .map_or(false, |children| lock(children).contains_key(&handle))
    }

    fn snapshot_owned(&self) -> Snapshot {
        match self.owned.get() {
            Some(children) => lock(children).values().cloned().collect(),
            None => Snapshot::new(),
        }
    }

    /// Empties both maps. The returned references are dropped by the caller
    /// after the locks are released.
    fn take_children(&self) -> Snapshot {
        let mut taken = Snapshot::new();
        for map in [&self.owned, &self.keep_alive] {
            if let Some(children) = map.get() {
                taken.extend(lock(children).drain().map(|(_, child)| child));
            }
        }
        taken
    }
}

fn insert_child(map: &OnceLock<Mutex<Children>>, child: Arc<dyn ManagedObject>, relation: &'static str) {
    let handle = child.handle();
    if handle.is_null() {
        tracing::debug!(target: "skbind::object", type_name = child.type_name(), relation, "ignoring child without a handle");
        return;
    }
    let displaced = lock(map.get_or_init(Default::default)).insert(handle, child);
    drop(displaced);
}

/// Attaches `child` to `owner`, or disposes it at once when there is no owner.
pub fn own_or_dispose(owner: Option<&dyn ManagedObject>, child: Arc<dyn ManagedObject>) {
    match owner {
        Some(owner) => owner.core().adopt_owned_child(child),
        None => child.dispose(),
    }
}

/// Hands the native object over to native code.
///
/// The proxy stops owning its handle and ignores public dispose from now on.
/// With an owner it becomes that owner's child and is torn down with it;
/// without one it is disposed internally at once.
pub fn transfer_ownership_to_native(object: &Arc<dyn ManagedObject>, new_owner: Option<&dyn ManagedObject>) {
    let core = object.core();
    core.set_owns_handle(false);
    core.prevent_public_disposal();
    match new_owner {
        Some(owner) => owner.core().adopt_owned_child(Arc::clone(object)),
        None => object.dispose_internal(),
    }
}

// =============================================================================
// Proxy
// =============================================================================

/// Managed proxy for one native object of kind `K`.
pub struct Proxy<K: NativeKind> {
    core: ObjectCore,
    kind: K,
}

impl<K: NativeKind> Proxy<K> {
    fn build(handle: Handle, owns_handle: bool, kind: K) -> Self {
        let site = alloc_log::capture_site();
        alloc_log::notify(Phase::ConstructEnter, K::TYPE_NAME, site.as_ref());
        let proxy = Self {
            core: ObjectCore::new(handle, owns_handle, site),
            kind,
        };
        alloc_log::notify(Phase::ConstructExit, K::TYPE_NAME, proxy.core.alloc_site.as_ref());
        proxy
    }

    /// Wraps a freshly created native object and registers it.
    ///
    /// Fails with [`Error::CreateFailed`] when the native create call
    /// returned null, and with [`Error::InvalidOperation`] when a live proxy
    /// already wraps the handle. On failure the native object is left to the
    /// caller. Create paths of registered kinds that may return a shared
    /// object go through [`HandleRegistry::acquire_created`] instead.
    pub fn new(handle: Handle, owns_handle: bool, kind: K) -> Result<Arc<Self>> {
        if handle.is_null() {
            return Err(Error::CreateFailed(K::TYPE_NAME));
        }
        let proxy = Arc::new(Self::build(handle, owns_handle, kind));
        if let Err(err) = proxy.register() {
            proxy.detach();
            return Err(err);
        }
        Ok(proxy)
    }

    /// Builds a proxy that is never registered, whatever `K::REGISTERED` says.
    pub(crate) fn new_unregistered(handle: Handle, owns_handle: bool, kind: K) -> Arc<Self> {
        Arc::new(Self::build(handle, owns_handle, kind))
    }

    /// Builds a proxy without a handle. `build` receives a weak reference to
    /// the proxy, for kinds whose native object needs to call back into it.
    /// The handle is supplied later with [`Proxy::assign_handle`].
    pub fn new_cyclic(owns_handle: bool, build: impl FnOnce(&Weak<Self>) -> K) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self::build(Handle::NULL, owns_handle, build(weak)))
    }

    /// Stores the handle, then registers the proxy.
    pub fn assign_handle(self: &Arc<Self>, handle: Handle) -> Result<()> {
        if handle.is_null() {
            return Err(Error::CreateFailed(K::TYPE_NAME));
        }
        if self.core.is_disposed() {
            return Err(Error::ObjectDisposed(K::TYPE_NAME));
        }
        self.core.handle.store(handle.raw(), Ordering::Release);
        if let Err(err) = self.register() {
            self.detach();
            return Err(err);
        }
        Ok(())
    }

    fn register(self: &Arc<Self>) -> Result<()> {
        if !K::REGISTERED {
            return Ok(());
        }
        let weak: Weak<dyn ManagedObject> = Arc::downgrade(self) as Weak<dyn ManagedObject>;
        HandleRegistry::global().register(self.handle(), weak)
    }

    /// Forgets a handle that was never registered to this proxy, so dropping
    /// the proxy leaves the native object alone.
    pub(crate) fn detach(&self) {
        self.core.set_owns_handle(false);
        self.core.handle.store(0, Ordering::Release);
    }

    /// Deregisters, then clears the handle.
    fn clear_handle(&self) {
        let old = self.handle();
        if !old.is_null() && K::REGISTERED {
            HandleRegistry::global().deregister(old, self.identity());
        }
        self.core.handle.store(0, Ordering::Release);
    }

    pub(crate) fn identity(&self) -> *const () {
        self as *const Self as *const ()
    }

    pub fn handle(&self) -> Handle {
        self.core.handle()
    }

    /// The handle, or [`Error::ObjectDisposed`] once it is gone.
    pub fn try_handle(&self) -> Result<Handle> {
        let handle = self.core.handle();
        if handle.is_null() || self.core.is_disposed() {
            Err(Error::ObjectDisposed(K::TYPE_NAME))
        } else {
            Ok(handle)
        }
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    pub fn owns_handle(&self) -> bool {
        self.core.owns_handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn state(&self) -> DisposeState {
        self.core.state()
    }

    pub fn dispose(&self) {
        ManagedObject::dispose(self);
    }

    pub fn dispose_internal(&self) {
        if self.core.begin_dispose() {
            self.teardown(true);
            self.core.finish_dispose();
        }
    }

    pub fn prevent_public_disposal(&self) {
        self.core.prevent_public_disposal();
    }

    pub fn adopt_owned_child(&self, child: Arc<dyn ManagedObject>) {
        self.core.adopt_owned_child(child);
    }

    pub fn pin_kept_alive(&self, child: Arc<dyn ManagedObject>) {
        self.core.pin_kept_alive(child);
    }

    pub fn transfer_ownership_to_native(self: &Arc<Self>, new_owner: Option<&dyn ManagedObject>) {
        let object: Arc<dyn ManagedObject> = Arc::clone(self) as Arc<dyn ManagedObject>;
        transfer_ownership_to_native(&object, new_owner);
    }

    fn teardown(&self, disposing: bool) {
        if disposing {
            for child in self.core.snapshot_owned() {
                if !child.owns_handle() {
                    child.dispose_internal();
                }
            }
            self.kind.dispose_unowned_managed();
        }

        let handle = self.handle();
        if !handle.is_null() && self.core.owns_handle() {
            tracing::trace!(target: "skbind::object", type_name = K::TYPE_NAME, %handle, "destroying native object");
            self.kind.dispose_native(handle);
        }

        if disposing {
            for child in self.core.snapshot_owned() {
                if child.owns_handle() {
                    child.dispose_internal();
                }
            }
            drop(self.core.take_children());
            self.kind.dispose_managed();
        }

        self.clear_handle();
    }
}

impl<K: NativeKind> ManagedObject for Proxy<K> {
    fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn type_name(&self) -> &'static str {
        K::TYPE_NAME
    }

    fn dispose_internal(&self) {
        Proxy::dispose_internal(self);
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<K: NativeKind> Drop for Proxy<K> {
    fn drop(&mut self) {
        if !self.core.begin_dispose() {
            return;
        }
        let site = self.core.alloc_site.clone();
        alloc_log::notify(Phase::FinalizeEnter, K::TYPE_NAME, site.as_ref());
        if self.core.owns_handle() && !self.handle().is_null() {
            tracing::debug!(target: "skbind::object", type_name = K::TYPE_NAME, handle = %self.handle(), "finalizing undisposed proxy");
        }
        self.teardown(false);
        self.core.finish_dispose();
        alloc_log::notify(Phase::FinalizeExit, K::TYPE_NAME, site.as_ref());
    }
}

impl<K: NativeKind> fmt::Debug for Proxy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &K::TYPE_NAME)
            .field("handle", &self.handle())
            .field("owns_handle", &self.owns_handle())
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Wrappers
// =============================================================================

/// A typed wrapper around a proxy. Wrappers are cheap clones of the `Arc`.
pub trait NativeWrapper: Sized {
    type Kind: NativeKind;

    fn from_proxy(proxy: Arc<Proxy<Self::Kind>>) -> Self;

    fn proxy(&self) -> &Arc<Proxy<Self::Kind>>;

    fn handle(&self) -> Handle {
        self.proxy().handle()
    }

    fn try_handle(&self) -> Result<Handle> {
        self.proxy().try_handle()
    }

    fn owns_handle(&self) -> bool {
        self.proxy().owns_handle()
    }

    fn is_disposed(&self) -> bool {
        self.proxy().is_disposed()
    }

    fn dispose(&self) {
        self.proxy().dispose();
    }

    fn as_managed(&self) -> Arc<dyn ManagedObject> {
        Arc::clone(self.proxy()) as Arc<dyn ManagedObject>
    }

    /// Whether both wrappers share one proxy.
    fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(self.proxy(), other.proxy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    static NEXT: AtomicUsize = AtomicUsize::new(0x5000_0000);

    fn fresh_handle() -> Handle {
        Handle::from_raw(NEXT.fetch_add(0x10, Ordering::Relaxed))
    }

    struct Counted {
        destroys: Arc<AtomicU32>,
    }

    impl NativeKind for Counted {
        const TYPE_NAME: &'static str = "Counted";

        fn dispose_native(&self, _handle: Handle) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counted(owns: bool) -> (Arc<Proxy<Counted>>, Arc<AtomicU32>) {
        let destroys = Arc::new(AtomicU32::new(0));
        let proxy = Proxy::new(
            fresh_handle(),
            owns,
            Counted {
                destroys: destroys.clone(),
            },
        )
        .unwrap();
        (proxy, destroys)
    }

    #[test]
    fn test_null_handle_fails_construction() {
        let err = Proxy::new(
            Handle::NULL,
            true,
            Counted {
                destroys: Arc::default(),
            },
        )
        .unwrap_err();
        assert_eq!(err, Error::CreateFailed("Counted"));
    }

    #[test]
    fn test_state_transitions() {
        let (proxy, destroys) = counted(true);
        assert_eq!(proxy.state(), DisposeState::Live);
        proxy.dispose();
        assert_eq!(proxy.state(), DisposeState::Disposed);
        assert!(proxy.handle().is_null());
        assert_eq!(proxy.try_handle(), Err(Error::ObjectDisposed("Counted")));
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_finalizes_owning_proxy() {
        let (proxy, destroys) = counted(true);
        drop(proxy);
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_after_dispose_does_not_destroy_again() {
        let (proxy, destroys) = counted(true);
        proxy.dispose();
        drop(proxy);
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_children_without_handles_are_ignored() {
        let (parent, _) = counted(true);
        let (child, _) = counted(true);
        child.dispose();
        parent.adopt_owned_child(child);
        assert_eq!(parent.core().owned_count(), 0);
    }

    #[test]
    fn test_own_or_dispose_without_owner_disposes() {
        let (child, destroys) = counted(true);
        own_or_dispose(None, child.clone());
        assert!(child.is_disposed());
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unpin_returns_child() {
        let (parent, _) = counted(true);
        let (child, _) = counted(false);
        let handle = child.handle();
        parent.pin_kept_alive(child);
        assert!(parent.core().keeps_alive(handle));
        assert!(parent.core().unpin_kept_alive(handle).is_some());
        assert_eq!(parent.core().kept_alive_count(), 0);
    }

    #[test]
    fn test_clear_kept_alive_releases_every_pin() {
        let (parent, _) = counted(true);
        let (first, _) = counted(false);
        let (second, _) = counted(false);
        parent.pin_kept_alive(first);
        parent.pin_kept_alive(second);
        assert_eq!(parent.core().clear_kept_alive(), 2);
        assert_eq!(parent.core().kept_alive_count(), 0);
        assert_eq!(parent.core().clear_kept_alive(), 0);
    }

    #[test]
    fn test_release_disposed_owned_keeps_live_children() {
        let (parent, _) = counted(true);
        let (live, _) = counted(false);
        let (gone, _) = counted(false);
        let live_handle = live.handle();
        parent.adopt_owned_child(live);
        parent.adopt_owned_child(gone.clone());
        gone.dispose();
        assert_eq!(parent.core().release_disposed_owned(), 1);
        assert_eq!(parent.core().owned_count(), 1);
        assert!(parent.core().has_owned_child(live_handle));
    }

    #[test]
    fn test_owned_child_or_adopt_caches_per_handle() {
        let (parent, _) = counted(true);
        let handle = fresh_handle();
        let make = || {
            Proxy::new(
                handle,
                false,
                Counted {
                    destroys: Arc::default(),
                },
            )
            .map(|proxy| proxy as Arc<dyn ManagedObject>)
        };
        let first = parent.core().owned_child_or_adopt(handle, make).unwrap();
        let second = parent.core().owned_child_or_adopt(handle, || unreachable!()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(parent.core().owned_count(), 1);
    }

    #[test]
    fn test_assign_handle_rejects_null() {
        let proxy = Proxy::new_cyclic(true, |_| Counted {
            destroys: Arc::default(),
        });
        assert_eq!(proxy.assign_handle(Handle::NULL), Err(Error::CreateFailed("Counted")));
        assert!(proxy.handle().is_null());
    }
}
