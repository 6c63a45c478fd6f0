//! Reference counting for native objects.
//!
//! Virtually reference-counted objects start with a [`RefCntBase`] whose
//! destroy function is picked at construction, so one set of entry points
//! (`sk_refcnt_*`) serves every such type. Non-virtual objects start with a
//! bare [`NvRefCnt`] and expose type-specific ref/unref entry points.

use crate::heap;
use crate::types::{sk_nvrefcnt_t, sk_refcnt_t};
use std::sync::atomic::{AtomicI32, Ordering};

#[repr(C)]
pub(crate) struct RefCntBase {
    refs: AtomicI32,
    destroy: unsafe fn(*mut RefCntBase),
}

impl RefCntBase {
    pub(crate) fn new(destroy: unsafe fn(*mut RefCntBase)) -> Self {
        Self {
            refs: AtomicI32::new(1),
            destroy,
        }
    }
}

#[repr(C)]
pub(crate) struct NvRefCnt {
    refs: AtomicI32,
}

impl NvRefCnt {
    pub(crate) fn new() -> Self {
        Self {
            refs: AtomicI32::new(1),
        }
    }
}

/// Adds a reference to a virtually reference-counted object.
pub(crate) unsafe fn ref_base(base: *mut RefCntBase) {
    if !heap::check_live(base as usize, "ref") {
        return;
    }
    (*base).refs.fetch_add(1, Ordering::Relaxed);
}

/// Drops a reference, destroying the object when it was the last one.
pub(crate) unsafe fn unref_base(base: *mut RefCntBase) {
    if !heap::check_live(base as usize, "unref") {
        return;
    }
    if (*base).refs.fetch_sub(1, Ordering::AcqRel) == 1 {
        ((*base).destroy)(base);
    }
}

pub(crate) unsafe fn ref_nv(obj: *mut NvRefCnt) {
    if !heap::check_live(obj as usize, "ref") {
        return;
    }
    (*obj).refs.fetch_add(1, Ordering::Relaxed);
}

/// Returns `true` when the caller dropped the last reference and must free.
pub(crate) unsafe fn unref_nv(obj: *mut NvRefCnt) -> bool {
    if !heap::check_live(obj as usize, "unref") {
        return false;
    }
    (*obj).refs.fetch_sub(1, Ordering::AcqRel) == 1
}

#[no_mangle]
pub unsafe extern "C" fn sk_refcnt_safe_ref(obj: *mut sk_refcnt_t) {
    if !obj.is_null() {
        ref_base(obj as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_refcnt_safe_unref(obj: *mut sk_refcnt_t) {
    if !obj.is_null() {
        unref_base(obj as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_refcnt_unique(obj: *const sk_refcnt_t) -> bool {
    sk_refcnt_get_ref_count(obj) == 1
}

#[no_mangle]
pub unsafe extern "C" fn sk_refcnt_get_ref_count(obj: *const sk_refcnt_t) -> i32 {
    if !heap::is_live(obj as usize) {
        return 0;
    }
    (*(obj as *const RefCntBase)).refs.load(Ordering::Acquire)
}

#[no_mangle]
pub unsafe extern "C" fn sk_nvrefcnt_unique(obj: *const sk_nvrefcnt_t) -> bool {
    sk_nvrefcnt_get_ref_count(obj) == 1
}

#[no_mangle]
pub unsafe extern "C" fn sk_nvrefcnt_get_ref_count(obj: *const sk_nvrefcnt_t) -> i32 {
    if !heap::is_live(obj as usize) {
        return 0;
    }
    (*(obj as *const NvRefCnt)).refs.load(Ordering::Acquire)
}
