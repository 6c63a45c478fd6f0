//! Reference-counted native objects
//!
//! A kind that is reference-counted names its counting scheme through
//! [`RefCounted::Counting`]. Virtually reference-counted objects share one
//! set of native entry points ([`VirtualRefCnt`]); non-virtual ones supply a
//! type-specific [`RefCounting`] implementation. The choice is static, so no
//! runtime type test is involved in releasing a reference.
//!
//! ```ignore
//! struct ShaderNative;
//!
//! impl RefCounted for ShaderNative {
//!     type Counting = VirtualRefCnt;
//! }
//!
//! impl NativeKind for ShaderNative {
//!     const TYPE_NAME: &'static str = "Shader";
//!
//!     fn dispose_native(&self, handle: Handle) {
//!         refcnt::safe_unref::<Self>(handle);
//!     }
//!
//!     fn release_redundant_ref(handle: Handle) {
//!         refcnt::safe_unref::<Self>(handle);
//!     }
//! }
//! ```

use crate::handle::Handle;
use crate::object::NativeKind;
use skbind_native::{sk_refcnt_safe_ref, sk_refcnt_safe_unref, sk_refcnt_t, sk_refcnt_unique};

/// Native reference-counting entry points for one family of objects.
pub trait RefCounting {
    /// Whether the objects use the shared virtual entry points.
    const VIRTUAL: bool;

    fn reference(handle: Handle);

    fn unreference(handle: Handle);

    fn is_unique(handle: Handle) -> bool;
}

/// Counting through the shared `sk_refcnt_*` entry points.
pub struct VirtualRefCnt;

impl RefCounting for VirtualRefCnt {
    const VIRTUAL: bool = true;

    fn reference(handle: Handle) {
        // SAFETY: null-tolerant; the handle refers to a ref-counted object.
        unsafe { sk_refcnt_safe_ref(handle.as_ptr()) }
    }

    fn unreference(handle: Handle) {
        // SAFETY: as above.
        unsafe { sk_refcnt_safe_unref(handle.as_ptr()) }
    }

    fn is_unique(handle: Handle) -> bool {
        // SAFETY: as above.
        unsafe { sk_refcnt_unique(handle.as_ptr::<sk_refcnt_t>()) }
    }
}

/// A kind whose native objects are reference-counted.
pub trait RefCounted: NativeKind {
    type Counting: RefCounting;
}

pub fn safe_ref<K: RefCounted>(handle: Handle) {
    if !handle.is_null() {
        K::Counting::reference(handle);
    }
}

/// Releases one reference. Null handles are ignored.
pub fn safe_unref<K: RefCounted>(handle: Handle) {
    if !handle.is_null() {
        K::Counting::unreference(handle);
    }
}

/// Whether the caller holds the only reference.
pub fn is_unique<K: RefCounted>(handle: Handle) -> bool {
    !handle.is_null() && K::Counting::is_unique(handle)
}

pub fn is_virtual<K: RefCounted>() -> bool {
    K::Counting::VIRTUAL
}
