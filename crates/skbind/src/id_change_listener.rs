//! ID change listeners
//!
//! A listener is notified once when the generation ID it watches is
//! invalidated. Listeners are collected in an [`IdChangeListenerList`];
//! adding one hands its native reference to the list, after which the
//! listener cannot be disposed publicly and is torn down when the list fires,
//! resets or goes away.

use skbind_core::refcnt::{self, RefCounted};
use skbind_core::{
    dispatch, dispatch_destroy, BridgeTarget, BridgedKind, ContextTable, Error, Handle, ManagedObject, NativeBridge,
    NativeKind, NativeWrapper, ProcTable, Proxy, Result, VirtualRefCnt,
};
use skbind_native::{
    sk_idchangelistener_procs_t, sk_idchangelistener_t, sk_idchangelistenerlist_procs_t,
    sk_idchangelistenerlist_t, sk_managedidchangelistener_mark_should_deregister, sk_managedidchangelistener_new,
    sk_managedidchangelistener_set_procs, sk_managedidchangelistener_should_deregister,
    sk_managedidchangelistenerlist_add, sk_managedidchangelistenerlist_changed, sk_managedidchangelistenerlist_count,
    sk_managedidchangelistenerlist_delete, sk_managedidchangelistenerlist_new, sk_managedidchangelistenerlist_reset,
    sk_managedidchangelistenerlist_set_procs,
};
use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, Weak};

/// Receives the change notification of an [`IdChangeListener`].
pub trait IdChangeHandler: Send + Sync + 'static {
    fn changed(&self);

    /// Called once when the listener is torn down.
    fn on_dispose(&self) {}
}

pub struct IdChangeListenerNative<H: IdChangeHandler> {
    bridge: NativeBridge,
    handler: H,
}

impl<H: IdChangeHandler> NativeKind for IdChangeListenerNative<H> {
    const TYPE_NAME: &'static str = "IdChangeListener";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        if !self.bridge.destroyed_natively() {
            refcnt::safe_unref::<Self>(handle);
        }
    }

    fn dispose_managed(&self) {
        self.handler.on_dispose();
    }
}

impl<H: IdChangeHandler> RefCounted for IdChangeListenerNative<H> {
    type Counting = VirtualRefCnt;
}

impl<H: IdChangeHandler> BridgedKind for IdChangeListenerNative<H> {
    fn bridge(&self) -> &NativeBridge {
        &self.bridge
    }
}

trait ListenerTarget: BridgeTarget {
    fn changed(&self);
}

impl<H: IdChangeHandler> ListenerTarget for Proxy<IdChangeListenerNative<H>> {
    fn changed(&self) {
        self.kind().handler.changed();
    }
}

static LISTENERS: ContextTable<dyn ListenerTarget> = ContextTable::new();
static LISTENER_PROCS: ProcTable = ProcTable::new();

/// A listener whose notifications go to `H`.
pub struct IdChangeListener<H: IdChangeHandler>(Arc<Proxy<IdChangeListenerNative<H>>>);

impl<H: IdChangeHandler> IdChangeListener<H> {
    pub fn new(handler: H) -> Result<Self> {
        LISTENER_PROCS.ensure("IdChangeListener", register_listener_procs);
        let proxy = Proxy::new_cyclic(true, |weak| {
            let target: Weak<dyn ListenerTarget> = weak.clone();
            IdChangeListenerNative {
                bridge: NativeBridge::new(LISTENERS.create(target)),
                handler,
            }
        });
        let token = proxy.kind().bridge.token();
        // SAFETY: the context is an opaque token, resolved only through the table.
        let handle = Handle::from_mut_ptr(unsafe { sk_managedidchangelistener_new(token.as_ptr()) });
        if let Err(err) = proxy.assign_handle(handle) {
            LISTENERS.release(token);
            return Err(err);
        }
        Ok(Self(proxy))
    }

    pub fn handler(&self) -> &H {
        &self.0.kind().handler
    }

    fn raw(&self) -> Result<*mut sk_idchangelistener_t> {
        Ok(self.try_handle()?.as_ptr())
    }

    /// Asks the owning list to skip and drop this listener.
    pub fn mark_should_deregister(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_managedidchangelistener_mark_should_deregister(self.raw()?) };
        Ok(())
    }

    pub fn should_deregister(&self) -> Result<bool> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_managedidchangelistener_should_deregister(self.raw()?) })
    }

    /// Whether the native listener was destroyed before this proxy was disposed.
    pub fn destroyed_natively(&self) -> bool {
        self.0.kind().bridge.destroyed_natively()
    }
}

impl<H: IdChangeHandler> Clone for IdChangeListener<H> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<H: IdChangeHandler> NativeWrapper for IdChangeListener<H> {
    type Kind = IdChangeListenerNative<H>;

    fn from_proxy(proxy: Arc<Proxy<IdChangeListenerNative<H>>>) -> Self {
        Self(proxy)
    }

    fn proxy(&self) -> &Arc<Proxy<IdChangeListenerNative<H>>> {
        &self.0
    }
}

impl<H: IdChangeHandler> fmt::Debug for IdChangeListener<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("IdChangeListener").field(&self.0).finish()
    }
}

fn register_listener_procs() {
    let procs = sk_idchangelistener_procs_t {
        changed: Some(listener_changed_proc),
        destroy: Some(listener_destroy_proc),
    };
    // SAFETY: the procs are plain functions that live for the whole program.
    unsafe { sk_managedidchangelistener_set_procs(procs) };
}

unsafe extern "C" fn listener_changed_proc(_listener: *mut sk_idchangelistener_t, context: *mut c_void) {
    dispatch(&LISTENERS, context, "changed", |target| target.changed());
}

unsafe extern "C" fn listener_destroy_proc(_listener: *mut sk_idchangelistener_t, context: *mut c_void) {
    dispatch_destroy(&LISTENERS, context);
}

// =============================================================================
// Listener list
// =============================================================================

pub struct IdChangeListenerListNative {
    bridge: NativeBridge,
}

impl NativeKind for IdChangeListenerListNative {
    const TYPE_NAME: &'static str = "IdChangeListenerList";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        if !self.bridge.destroyed_natively() {
            // SAFETY: lists are deleted exactly once, by their proxy.
            unsafe { sk_managedidchangelistenerlist_delete(handle.as_ptr()) }
        }
    }
}

impl BridgedKind for IdChangeListenerListNative {
    fn bridge(&self) -> &NativeBridge {
        &self.bridge
    }
}

static LISTS: ContextTable<dyn BridgeTarget> = ContextTable::new();
static LIST_PROCS: ProcTable = ProcTable::new();

native_wrapper! {
    /// Listeners waiting for the same ID to change.
    pub struct IdChangeListenerList(IdChangeListenerListNative);
}

impl IdChangeListenerList {
    pub fn new() -> Result<Self> {
        LIST_PROCS.ensure("IdChangeListenerList", register_list_procs);
        let proxy = Proxy::new_cyclic(true, |weak| {
            let target: Weak<dyn BridgeTarget> = weak.clone();
            IdChangeListenerListNative {
                bridge: NativeBridge::new(LISTS.create(target)),
            }
        });
        let token = proxy.kind().bridge.token();
        // SAFETY: the context is an opaque token, resolved only through the table.
        let handle = Handle::from_mut_ptr(unsafe { sk_managedidchangelistenerlist_new(token.as_ptr()) });
        if let Err(err) = proxy.assign_handle(handle) {
            LISTS.release(token);
            return Err(err);
        }
        Ok(Self(proxy))
    }

    fn raw(&self) -> Result<*mut sk_idchangelistenerlist_t> {
        Ok(self.try_handle()?.as_ptr())
    }

    /// Adds `listener`, handing its native reference to the list.
    ///
    /// Listeners already marked for deregistration are dropped from the
    /// list first. A listener can only be added once.
    pub fn add<H: IdChangeHandler>(&self, listener: &IdChangeListener<H>, single_threaded: bool) -> Result<()> {
        let list = self.raw()?;
        let proxy = listener.proxy();
        if !proxy.core().try_revoke_ownership() {
            return Err(Error::InvalidOperation("the listener already belongs to a list".into()));
        }
        let handle = proxy.try_handle()?;
        // SAFETY: both are live; the list adopts the reference this call
        // took from the proxy.
        unsafe { sk_managedidchangelistenerlist_add(list, handle.as_ptr(), single_threaded) };
        let owner: &dyn ManagedObject = &*self.0;
        proxy.transfer_ownership_to_native(Some(owner));
        self.0.core().release_disposed_owned();
        Ok(())
    }

    /// Number of listeners held, including ones marked for deregistration.
    pub fn count(&self) -> Result<usize> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_managedidchangelistenerlist_count(self.raw()?) }.max(0) as usize)
    }

    /// Notifies every listener not marked for deregistration, then empties
    /// the list.
    pub fn changed(&self, single_threaded: bool) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_managedidchangelistenerlist_changed(self.raw()?, single_threaded) };
        let released = self.0.core().release_disposed_owned();
        tracing::trace!(target: "skbind::bridge", released, "listener list fired");
        Ok(())
    }

    /// Empties the list without notifying.
    pub fn reset(&self, single_threaded: bool) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_managedidchangelistenerlist_reset(self.raw()?, single_threaded) };
        self.0.core().release_disposed_owned();
        Ok(())
    }
}

fn register_list_procs() {
    let procs = sk_idchangelistenerlist_procs_t {
        destroy: Some(list_destroy_proc),
    };
    // SAFETY: the proc is a plain function that lives for the whole program.
    unsafe { sk_managedidchangelistenerlist_set_procs(procs) };
}

unsafe extern "C" fn list_destroy_proc(_list: *mut sk_idchangelistenerlist_t, context: *mut c_void) {
    dispatch_destroy(&LISTS, context);
}
