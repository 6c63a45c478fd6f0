//! Allocation ledger for native objects.
//!
//! Every native object is boxed and tracked by address. Destroying an address
//! that is not live is recorded as a double free and skipped, so a faulty
//! caller shows up in [`crate::debug`] instead of corrupting the heap.

use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Native object categories, used for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Paint,
    Canvas,
    String,
    ImageFilter,
    Shader,
    Blender,
    Vertices,
    RuntimeEffect,
    RuntimeEffectBuilder,
    IdChangeListener,
    IdChangeListenerList,
}

#[derive(Clone, Copy)]
struct LiveObject {
    id: u64,
    kind: ObjectKind,
}

#[derive(Default)]
struct Ledger {
    live: FxHashMap<usize, LiveObject>,
    destroyed: FxHashMap<u64, u32>,
    double_frees: u64,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);
static LEDGER: OnceLock<Mutex<Ledger>> = OnceLock::new();

fn ledger() -> MutexGuard<'static, Ledger> {
    LEDGER
        .get_or_init(|| Mutex::new(Ledger::default()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Boxes `value` and records the resulting address as live.
pub(crate) fn alloc<T>(kind: ObjectKind, value: T) -> *mut T {
    let ptr = Box::into_raw(Box::new(value));
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    ledger().live.insert(ptr as usize, LiveObject { id, kind });
    tracing::trace!(?kind, id, addr = ptr as usize, "native alloc");
    ptr
}

/// Frees an object created by [`alloc`].
///
/// Returns `false` without touching memory when `ptr` is null or not live.
///
/// # Safety
///
/// `ptr` must have been produced by `alloc::<T>` with the same `T`.
pub(crate) unsafe fn free<T>(ptr: *mut T) -> bool {
    if ptr.is_null() {
        return false;
    }
    let removed = {
        let mut ledger = ledger();
        match ledger.live.remove(&(ptr as usize)) {
            Some(object) => {
                *ledger.destroyed.entry(object.id).or_insert(0) += 1;
                Some(object)
            }
            None => {
                ledger.double_frees += 1;
                None
            }
        }
    };
    match removed {
        Some(object) => {
            tracing::trace!(kind = ?object.kind, id = object.id, "native free");
            // The ledger lock is released: dropping may free nested objects.
            drop(Box::from_raw(ptr));
            true
        }
        None => {
            tracing::error!(addr = ptr as usize, "native free of an address that is not live");
            false
        }
    }
}

pub(crate) fn is_live(addr: usize) -> bool {
    addr != 0 && ledger().live.contains_key(&addr)
}

/// Like [`is_live`], but records a double free when the check fails.
pub(crate) fn check_live(addr: usize, operation: &'static str) -> bool {
    if addr == 0 {
        return false;
    }
    let mut ledger = ledger();
    if ledger.live.contains_key(&addr) {
        true
    } else {
        ledger.double_frees += 1;
        drop(ledger);
        tracing::error!(addr, operation, "native call on an address that is not live");
        false
    }
}

pub(crate) fn object_id(addr: usize) -> Option<u64> {
    ledger().live.get(&addr).map(|object| object.id)
}

pub(crate) fn destroy_count(id: u64) -> u32 {
    ledger().destroyed.get(&id).copied().unwrap_or(0)
}

pub(crate) fn double_free_count() -> u64 {
    ledger().double_frees
}

pub(crate) fn live_count(kind: ObjectKind) -> usize {
    ledger().live.values().filter(|object| object.kind == kind).count()
}

pub(crate) fn kind_at(addr: usize) -> Option<ObjectKind> {
    ledger().live.get(&addr).map(|object| object.kind)
}
