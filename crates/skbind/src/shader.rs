//! Shaders

use crate::types::Color;
use skbind_core::{Handle, HandleRegistry, NativeWrapper, Result};
use skbind_native::{sk_shader_new_color, sk_shader_new_empty};

virtual_ref_counted_kind! {
    pub struct ShaderNative = "Shader";
}

native_wrapper! {
    pub struct Shader(ShaderNative);
}

impl Shader {
    /// A shader that draws nothing.
    pub fn empty() -> Result<Self> {
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_shader_new_empty() });
        Self::from_created(handle)
    }

    pub fn color(color: Color) -> Result<Self> {
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_shader_new_color(color.0) });
        Self::from_created(handle)
    }

    /// Wraps a shader returned by a native create call, which hands the
    /// caller one reference.
    pub(crate) fn from_created(handle: Handle) -> Result<Self> {
        Ok(Self(HandleRegistry::global().acquire_created(handle, |_, _| Ok(ShaderNative))?))
    }

    /// The proxy for `handle`, creating one if needed. A null handle yields `None`.
    pub fn from_native(handle: Handle, owns: bool, unref_existing: bool) -> Result<Option<Self>> {
        let proxy = HandleRegistry::global().get_or_add(handle, owns, unref_existing, |_, _| Ok(ShaderNative))?;
        Ok(proxy.map(Self))
    }

    /// Whether this proxy holds the only native reference.
    pub fn is_unique(&self) -> Result<bool> {
        Ok(skbind_core::refcnt::is_unique::<ShaderNative>(self.try_handle()?))
    }
}
