//! Runtime effects
//!
//! An effect is compiled from source text and describes its uniforms and
//! child slots. [`Uniform`] and [`EffectChild`] are views into the effect's
//! native memory: they never own a handle, are cached as owned children of
//! the effect, and fail with [`Error::ObjectDisposed`] once the effect is
//! gone.

use crate::string::SkString;
use crate::types::{ChildType, EffectKind, UniformType};
use skbind_core::{Error, Handle, HandleRegistry, ManagedObject, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_runtimeeffect_child_get_index, sk_runtimeeffect_child_get_name, sk_runtimeeffect_child_get_type,
    sk_runtimeeffect_child_t, sk_runtimeeffect_get_child_from_index, sk_runtimeeffect_get_child_from_name,
    sk_runtimeeffect_get_children_size, sk_runtimeeffect_get_kind, sk_runtimeeffect_get_uniform_byte_size,
    sk_runtimeeffect_get_uniform_from_index, sk_runtimeeffect_get_uniform_from_name,
    sk_runtimeeffect_get_uniforms_size, sk_runtimeeffect_make_for_blender, sk_runtimeeffect_make_for_color_filter,
    sk_runtimeeffect_make_for_shader, sk_runtimeeffect_t, sk_runtimeeffect_uniform_get_name,
    sk_runtimeeffect_uniform_get_offset, sk_runtimeeffect_uniform_get_size_in_bytes,
    sk_runtimeeffect_uniform_get_type, sk_runtimeeffect_uniform_t, sk_string_t,
};
use std::ffi::{c_char, CStr, CString};
use std::sync::{Arc, Weak};

virtual_ref_counted_kind! {
    pub struct RuntimeEffectNative = "RuntimeEffect";
}

native_wrapper! {
    /// A compiled shader, color filter or blender program.
    pub struct RuntimeEffect(RuntimeEffectNative);
}

type Compile = unsafe extern "C" fn(*const sk_string_t, *mut sk_string_t) -> *mut sk_runtimeeffect_t;

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| Error::invalid_argument("name", "must not contain NUL bytes"))
}

/// Copies a NUL-terminated native string, or returns an empty one for null.
unsafe fn name_from_ptr(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

impl RuntimeEffect {
    pub fn for_shader(source: &str) -> Result<Self> {
        Self::compile(source, sk_runtimeeffect_make_for_shader)
    }

    pub fn for_color_filter(source: &str) -> Result<Self> {
        Self::compile(source, sk_runtimeeffect_make_for_color_filter)
    }

    pub fn for_blender(source: &str) -> Result<Self> {
        Self::compile(source, sk_runtimeeffect_make_for_blender)
    }

    /// Compilation errors are reported as an invalid `source` argument
    /// carrying the compiler message.
    fn compile(source: &str, compile: Compile) -> Result<Self> {
        let text = SkString::from_text(source)?;
        let errors = SkString::new()?;
        let effect = {
            let (text_handle, error_handle) = (text.try_handle()?, errors.try_handle()?);
            // SAFETY: both strings are live for the duration of the call.
            unsafe { compile(text_handle.as_ptr::<sk_string_t>(), error_handle.as_ptr()) }
        };
        if effect.is_null() {
            let message = errors.to_string_lossy()?;
            tracing::debug!(target: "skbind::object", %message, "runtime effect failed to compile");
            return Err(Error::invalid_argument("source", message));
        }
        let handle = Handle::from_mut_ptr(effect);
        Ok(Self(HandleRegistry::global().acquire_created(handle, |_, _| Ok(RuntimeEffectNative))?))
    }

    pub fn from_native(handle: Handle, owns: bool, unref_existing: bool) -> Result<Option<Self>> {
        let proxy =
            HandleRegistry::global().get_or_add(handle, owns, unref_existing, |_, _| Ok(RuntimeEffectNative))?;
        Ok(proxy.map(Self))
    }

    fn raw(&self) -> Result<*const sk_runtimeeffect_t> {
        Ok(self.try_handle()?.as_ptr::<sk_runtimeeffect_t>())
    }

    pub fn kind(&self) -> Result<EffectKind> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_runtimeeffect_get_kind(self.raw()?) }.into())
    }

    /// Total size of the uniform block in bytes.
    pub fn uniform_size(&self) -> Result<usize> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_runtimeeffect_get_uniform_byte_size(self.raw()?) })
    }

    pub fn uniform_count(&self) -> Result<usize> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_runtimeeffect_get_uniforms_size(self.raw()?) })
    }

    pub fn child_count(&self) -> Result<usize> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_runtimeeffect_get_children_size(self.raw()?) })
    }

    pub fn uniform(&self, index: usize) -> Result<Option<Uniform>> {
        // SAFETY: live while the proxy is.
        let uniform = unsafe { sk_runtimeeffect_get_uniform_from_index(self.raw()?, index) };
        self.view(Handle::from_ptr(uniform), Uniform)
    }

    pub fn uniform_by_name(&self, name: &str) -> Result<Option<Uniform>> {
        let name = c_name(name)?;
        // SAFETY: live while the proxy is; `name` is NUL-terminated.
        let uniform = unsafe { sk_runtimeeffect_get_uniform_from_name(self.raw()?, name.as_ptr()) };
        self.view(Handle::from_ptr(uniform), Uniform)
    }

    pub fn uniforms(&self) -> Result<Vec<Uniform>> {
        (0..self.uniform_count()?)
            .filter_map(|index| self.uniform(index).transpose())
            .collect()
    }

    pub fn child(&self, index: usize) -> Result<Option<EffectChild>> {
        // SAFETY: live while the proxy is.
        let child = unsafe { sk_runtimeeffect_get_child_from_index(self.raw()?, index) };
        self.view(Handle::from_ptr(child), EffectChild)
    }

    pub fn child_by_name(&self, name: &str) -> Result<Option<EffectChild>> {
        let name = c_name(name)?;
        // SAFETY: live while the proxy is; `name` is NUL-terminated.
        let child = unsafe { sk_runtimeeffect_get_child_from_name(self.raw()?, name.as_ptr()) };
        self.view(Handle::from_ptr(child), EffectChild)
    }

    pub fn children(&self) -> Result<Vec<EffectChild>> {
        (0..self.child_count()?)
            .filter_map(|index| self.child(index).transpose())
            .collect()
    }

    /// The cached view for `handle`, created on first access.
    fn view<W>(&self, handle: Handle, wrap: fn(Arc<Proxy<ViewNative>>) -> W) -> Result<Option<W>> {
        if handle.is_null() {
            return Ok(None);
        }
        let effect = Arc::downgrade(&self.0);
        let object = self.0.core().owned_child_or_adopt(handle, || {
            Ok(Proxy::new(handle, false, ViewNative { effect })? as Arc<dyn ManagedObject>)
        })?;
        let actual = object.type_name();
        let proxy = object.into_any().downcast::<Proxy<ViewNative>>().map_err(|_| Error::TypeMismatch {
            handle,
            expected: ViewNative::TYPE_NAME,
            actual,
        })?;
        Ok(Some(wrap(proxy)))
    }
}

// =============================================================================
// Views
// =============================================================================

/// A non-owning view into an effect's native description.
pub struct ViewNative {
    effect: Weak<Proxy<RuntimeEffectNative>>,
}

impl NativeKind for ViewNative {
    const TYPE_NAME: &'static str = "RuntimeEffectView";
    const REGISTERED: bool = false;

    fn dispose_native(&self, _handle: Handle) {}
}

/// Runs `f` with the view's handle while the effect is known to be alive.
fn with_view<T>(proxy: &Proxy<ViewNative>, f: impl FnOnce(Handle) -> T) -> Result<T> {
    let handle = proxy.try_handle()?;
    let effect = proxy
        .kind()
        .effect
        .upgrade()
        .filter(|effect| !effect.is_disposed())
        .ok_or(Error::ObjectDisposed(RuntimeEffectNative::TYPE_NAME))?;
    let result = f(handle);
    drop(effect);
    Ok(result)
}

native_wrapper! {
    /// One uniform declared by a runtime effect.
    pub struct Uniform(ViewNative);
}

impl Uniform {
    pub fn name(&self) -> Result<String> {
        // SAFETY: the effect owning the description is alive.
        with_view(&self.0, |h| unsafe {
            name_from_ptr(sk_runtimeeffect_uniform_get_name(h.as_ptr::<sk_runtimeeffect_uniform_t>()))
        })
    }

    /// Byte offset within the uniform block.
    pub fn offset(&self) -> Result<usize> {
        // SAFETY: as above.
        with_view(&self.0, |h| unsafe {
            sk_runtimeeffect_uniform_get_offset(h.as_ptr::<sk_runtimeeffect_uniform_t>())
        })
    }

    pub fn size_in_bytes(&self) -> Result<usize> {
        // SAFETY: as above.
        with_view(&self.0, |h| unsafe {
            sk_runtimeeffect_uniform_get_size_in_bytes(h.as_ptr::<sk_runtimeeffect_uniform_t>())
        })
    }

    pub fn uniform_type(&self) -> Result<UniformType> {
        // SAFETY: as above.
        with_view(&self.0, |h| {
            UniformType::from(unsafe { sk_runtimeeffect_uniform_get_type(h.as_ptr::<sk_runtimeeffect_uniform_t>()) })
        })
    }
}

native_wrapper! {
    /// One child slot declared by a runtime effect.
    pub struct EffectChild(ViewNative);
}

impl EffectChild {
    pub fn name(&self) -> Result<String> {
        // SAFETY: the effect owning the description is alive.
        with_view(&self.0, |h| unsafe {
            name_from_ptr(sk_runtimeeffect_child_get_name(h.as_ptr::<sk_runtimeeffect_child_t>()))
        })
    }

    pub fn child_type(&self) -> Result<ChildType> {
        // SAFETY: as above.
        with_view(&self.0, |h| {
            ChildType::from(unsafe { sk_runtimeeffect_child_get_type(h.as_ptr::<sk_runtimeeffect_child_t>()) })
        })
    }

    /// Position among the effect's children.
    pub fn index(&self) -> Result<usize> {
        // SAFETY: as above.
        with_view(&self.0, |h| unsafe {
            sk_runtimeeffect_child_get_index(h.as_ptr::<sk_runtimeeffect_child_t>())
        })
    }
}
