//! Managed ID-change listeners and listener lists.
//!
//! A listener is virtually reference-counted; its destructor invokes the
//! destroy proc with the context pointer it was created with. A list adopts
//! the reference passed to [`sk_managedidchangelistenerlist_add`] and releases
//! it when the listeners are fired, reset, or the list is deleted.

use crate::heap::{self, ObjectKind};
use crate::refcnt::{unref_base, RefCntBase};
use crate::types::{
    sk_idchangelistener_procs_t, sk_idchangelistener_t, sk_idchangelistenerlist_procs_t,
    sk_idchangelistenerlist_t,
};
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};

static LISTENER_PROCS: RwLock<Option<sk_idchangelistener_procs_t>> = RwLock::new(None);
static LIST_PROCS: RwLock<Option<sk_idchangelistenerlist_procs_t>> = RwLock::new(None);

fn listener_procs() -> sk_idchangelistener_procs_t {
    LISTENER_PROCS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .unwrap_or_default()
}

fn list_procs() -> sk_idchangelistenerlist_procs_t {
    LIST_PROCS.read().unwrap_or_else(PoisonError::into_inner).unwrap_or_default()
}

#[repr(C)]
pub(crate) struct IdChangeListener {
    base: RefCntBase,
    context: *mut c_void,
    should_deregister: AtomicBool,
}

impl Drop for IdChangeListener {
    fn drop(&mut self) {
        if let Some(destroy) = listener_procs().destroy {
            let this = self as *mut IdChangeListener as *mut sk_idchangelistener_t;
            // SAFETY: the proc only receives the pointer as an identity.
            unsafe { destroy(this, self.context) };
        }
    }
}

unsafe fn destroy_listener(base: *mut RefCntBase) {
    heap::free(base as *mut IdChangeListener);
}

unsafe fn listener<'a>(listener: *const sk_idchangelistener_t, operation: &'static str) -> Option<&'a IdChangeListener> {
    if heap::check_live(listener as usize, operation) {
        Some(&*(listener as *const IdChangeListener))
    } else {
        None
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistener_set_procs(procs: sk_idchangelistener_procs_t) {
    *LISTENER_PROCS.write().unwrap_or_else(PoisonError::into_inner) = Some(procs);
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistener_new(context: *mut c_void) -> *mut sk_idchangelistener_t {
    heap::alloc(
        ObjectKind::IdChangeListener,
        IdChangeListener {
            base: RefCntBase::new(destroy_listener),
            context,
            should_deregister: AtomicBool::new(false),
        },
    ) as *mut sk_idchangelistener_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistener_mark_should_deregister(listener: *mut sk_idchangelistener_t) {
    if let Some(listener) = self::listener(listener, "idchangelistener_mark_should_deregister") {
        listener.should_deregister.store(true, Ordering::Release);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistener_should_deregister(listener: *mut sk_idchangelistener_t) -> bool {
    self::listener(listener, "idchangelistener_should_deregister")
        .map_or(false, |l| l.should_deregister.load(Ordering::Acquire))
}

unsafe fn fire_changed(listener: *mut IdChangeListener) {
    let Some(l) = self::listener(listener as *const sk_idchangelistener_t, "idchangelistener_changed") else {
        return;
    };
    if l.should_deregister.load(Ordering::Acquire) {
        return;
    }
    let context = l.context;
    if let Some(changed) = listener_procs().changed {
        changed(listener as *mut sk_idchangelistener_t, context);
    }
}

// ============================================================================
// List
// ============================================================================

pub(crate) struct IdChangeListenerList {
    context: *mut c_void,
    /// One reference per entry.
    listeners: Mutex<Vec<*mut IdChangeListener>>,
}

impl IdChangeListenerList {
    fn take(&self) -> Vec<*mut IdChangeListener> {
        std::mem::take(&mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

unsafe fn release_all(listeners: Vec<*mut IdChangeListener>) {
    for listener in listeners {
        unref_base(listener as *mut RefCntBase);
    }
}

impl Drop for IdChangeListenerList {
    fn drop(&mut self) {
        // SAFETY: see `listeners`.
        unsafe { release_all(self.take()) };
        if let Some(destroy) = list_procs().destroy {
            let this = self as *mut IdChangeListenerList as *mut sk_idchangelistenerlist_t;
            // SAFETY: the proc only receives the pointer as an identity.
            unsafe { destroy(this, self.context) };
        }
    }
}

unsafe fn list<'a>(list: *mut sk_idchangelistenerlist_t, operation: &'static str) -> Option<&'a IdChangeListenerList> {
    if heap::check_live(list as usize, operation) {
        Some(&*(list as *const IdChangeListenerList))
    } else {
        None
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_set_procs(procs: sk_idchangelistenerlist_procs_t) {
    *LIST_PROCS.write().unwrap_or_else(PoisonError::into_inner) = Some(procs);
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_new(context: *mut c_void) -> *mut sk_idchangelistenerlist_t {
    heap::alloc(
        ObjectKind::IdChangeListenerList,
        IdChangeListenerList {
            context,
            listeners: Mutex::new(Vec::new()),
        },
    ) as *mut sk_idchangelistenerlist_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_delete(list: *mut sk_idchangelistenerlist_t) {
    heap::free(list as *mut IdChangeListenerList);
}

/// Adopts the caller's reference on `listener`. Listeners already marked for
/// deregistration are dropped from the list first.
#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_add(
    list: *mut sk_idchangelistenerlist_t,
    listener: *mut sk_idchangelistener_t,
    _single_threaded: bool,
) {
    let Some(list) = self::list(list, "idchangelistenerlist_add") else {
        return;
    };
    if !heap::check_live(listener as usize, "idchangelistenerlist_add") {
        return;
    }
    let stale = {
        let mut listeners = list.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let (stale, keep): (Vec<_>, Vec<_>) = listeners
            .drain(..)
            .partition(|l| (**l).should_deregister.load(Ordering::Acquire));
        *listeners = keep;
        listeners.push(listener as *mut IdChangeListener);
        stale
    };
    release_all(stale);
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_count(list: *mut sk_idchangelistenerlist_t) -> i32 {
    self::list(list, "idchangelistenerlist_count")
        .map_or(0, |l| l.listeners.lock().unwrap_or_else(PoisonError::into_inner).len() as i32)
}

/// Fires every listener not marked for deregistration, then releases all of them.
#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_changed(
    list: *mut sk_idchangelistenerlist_t,
    _single_threaded: bool,
) {
    let Some(list) = self::list(list, "idchangelistenerlist_changed") else {
        return;
    };
    let listeners = list.take();
    for listener in &listeners {
        fire_changed(*listener);
    }
    release_all(listeners);
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedidchangelistenerlist_reset(
    list: *mut sk_idchangelistenerlist_t,
    _single_threaded: bool,
) {
    if let Some(list) = self::list(list, "idchangelistenerlist_reset") {
        release_all(list.take());
    }
}
