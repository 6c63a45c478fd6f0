//! Runtime effect builders
//!
//! A builder collects uniform values and child shaders for one effect and
//! turns them into a shader.

use crate::runtime_effect::{RuntimeEffect, RuntimeEffectNative};
use crate::shader::Shader;
use crate::types::EffectKind;
use skbind_core::{Acquired, Error, Handle, HandleRegistry, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_runtime_effect_builder_delete, sk_runtime_effect_builder_get_effect, sk_runtime_effect_builder_make_shader,
    sk_runtime_effect_builder_new, sk_runtime_effect_builder_set_child_shader,
    sk_runtime_effect_builder_set_uniform_float, sk_runtime_effect_builder_set_uniform_int,
    sk_runtimeeffectbuilder_t,
};
use std::ffi::CString;

pub struct RuntimeEffectBuilderNative;

impl NativeKind for RuntimeEffectBuilderNative {
    const TYPE_NAME: &'static str = "RuntimeEffectBuilder";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        // SAFETY: builders are deleted exactly once, by their proxy.
        unsafe { sk_runtime_effect_builder_delete(handle.as_ptr()) }
    }
}

native_wrapper! {
    /// Uniform values and children for a [`RuntimeEffect`].
    pub struct RuntimeEffectBuilder(RuntimeEffectBuilderNative);
}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::invalid_argument("name", "must not contain NUL bytes"))
}

impl RuntimeEffectBuilder {
    pub fn new(effect: &RuntimeEffect) -> Result<Self> {
        let effect = effect.try_handle()?;
        // SAFETY: the effect is live; the builder takes its own reference.
        let handle = Handle::from_mut_ptr(unsafe { sk_runtime_effect_builder_new(effect.as_ptr()) });
        Ok(Self(Proxy::new(handle, true, RuntimeEffectBuilderNative)?))
    }

    fn raw(&self) -> Result<*mut sk_runtimeeffectbuilder_t> {
        Ok(self.try_handle()?.as_ptr())
    }

    /// The effect this builder was created for.
    ///
    /// The native getter does not hand out a reference, so a proxy created
    /// here does not own the handle and is owned by the builder instead.
    pub fn effect(&self) -> Result<RuntimeEffect> {
        // SAFETY: live while the proxy is.
        let handle = Handle::from_mut_ptr(unsafe { sk_runtime_effect_builder_get_effect(self.raw()?) });
        let acquired = HandleRegistry::global()
            .get_or_add_with_status(handle, false, false, |_, _| Ok(RuntimeEffectNative))?;
        let Some((proxy, how)) = acquired else {
            return Err(Error::ObjectDisposed(RuntimeEffectNative::TYPE_NAME));
        };
        if how == Acquired::Created {
            self.0.adopt_owned_child(proxy.clone());
        }
        Ok(RuntimeEffect::from_proxy(proxy))
    }

    pub fn set_uniform_float(&self, name: &str, values: &[f32]) -> Result<()> {
        let builder = self.raw()?;
        let c = c_name(name)?;
        // SAFETY: live builder; `values` covers `len` floats.
        let accepted =
            unsafe { sk_runtime_effect_builder_set_uniform_float(builder, c.as_ptr(), values.as_ptr(), values.len()) };
        if accepted {
            Ok(())
        } else {
            Err(Error::invalid_argument("name", format!("no float uniform `{name}` of {} values", values.len())))
        }
    }

    pub fn set_uniform_int(&self, name: &str, values: &[i32]) -> Result<()> {
        let builder = self.raw()?;
        let c = c_name(name)?;
        // SAFETY: live builder; `values` covers `len` ints.
        let accepted =
            unsafe { sk_runtime_effect_builder_set_uniform_int(builder, c.as_ptr(), values.as_ptr(), values.len()) };
        if accepted {
            Ok(())
        } else {
            Err(Error::invalid_argument("name", format!("no int uniform `{name}` of {} values", values.len())))
        }
    }

    /// Binds `shader` to the child slot `name`, or clears it with `None`.
    pub fn set_child_shader(&self, name: &str, shader: Option<&Shader>) -> Result<()> {
        let builder = self.raw()?;
        let c = c_name(name)?;
        let shader = match shader {
            Some(shader) => shader.try_handle()?.as_ptr(),
            None => std::ptr::null_mut(),
        };
        // SAFETY: both are live or null; the builder references the shader.
        if unsafe { sk_runtime_effect_builder_set_child_shader(builder, c.as_ptr(), shader) } {
            Ok(())
        } else {
            Err(Error::invalid_argument("name", format!("no shader child `{name}`")))
        }
    }

    /// Builds a shader from the current uniforms and children.
    pub fn make_shader(&self) -> Result<Shader> {
        let builder = self.raw()?;
        if self.effect()?.kind()? != EffectKind::Shader {
            return Err(Error::InvalidOperation("the effect is not a shader effect".into()));
        }
        // SAFETY: live while the proxy is.
        let handle = Handle::from_mut_ptr(unsafe { sk_runtime_effect_builder_make_shader(builder) });
        Shader::from_created(handle)
    }
}
