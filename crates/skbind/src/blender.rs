//! Blenders

use crate::types::BlendMode;
use skbind_core::{Error, Handle, HandleRegistry, Result};
use skbind_native::{sk_blender_new_arithmetic, sk_blender_new_mode};

virtual_ref_counted_kind! {
    pub struct BlenderNative = "Blender";
}

native_wrapper! {
    pub struct Blender(BlenderNative);
}

impl Blender {
    pub fn mode(mode: BlendMode) -> Result<Self> {
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_blender_new_mode(mode.to_native()) });
        Self::from_created(handle)
    }

    /// `k1 * src * dst + k2 * src + k3 * dst + k4`
    pub fn arithmetic(k1: f32, k2: f32, k3: f32, k4: f32, enforce_premul: bool) -> Result<Self> {
        if [k1, k2, k3, k4].iter().any(|k| !k.is_finite()) {
            return Err(Error::invalid_argument("k", "coefficients must be finite"));
        }
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_blender_new_arithmetic(k1, k2, k3, k4, enforce_premul) });
        Self::from_created(handle)
    }

    /// Mode blenders are shared, so the handle may already have a proxy.
    fn from_created(handle: Handle) -> Result<Self> {
        Ok(Self(HandleRegistry::global().acquire_created(handle, |_, _| Ok(BlenderNative))?))
    }

    pub fn from_native(handle: Handle, owns: bool, unref_existing: bool) -> Result<Option<Self>> {
        let proxy = HandleRegistry::global().get_or_add(handle, owns, unref_existing, |_, _| Ok(BlenderNative))?;
        Ok(proxy.map(Self))
    }
}
