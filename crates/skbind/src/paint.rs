//! Paints

use crate::blender::Blender;
use crate::image_filter::ImageFilter;
use crate::shader::Shader;
use crate::types::{Color, PaintStyle};
use skbind_core::{Borrowed, Error, Handle, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_paint_clone, sk_paint_delete, sk_paint_get_blender, sk_paint_get_color, sk_paint_get_imagefilter,
    sk_paint_get_shader, sk_paint_get_stroke_width, sk_paint_get_style, sk_paint_is_antialias, sk_paint_new,
    sk_paint_reset, sk_paint_set_antialias, sk_paint_set_blender, sk_paint_set_color, sk_paint_set_imagefilter,
    sk_paint_set_shader, sk_paint_set_stroke_width, sk_paint_set_style, sk_paint_t,
};

pub struct PaintNative;

impl NativeKind for PaintNative {
    const TYPE_NAME: &'static str = "Paint";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        // SAFETY: owned paints are deleted exactly once, by their proxy.
        unsafe { sk_paint_delete(handle.as_ptr()) }
    }
}

native_wrapper! {
    /// Color, style and effects for drawing.
    pub struct Paint(PaintNative);
}

impl Paint {
    pub fn new() -> Result<Self> {
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_paint_new() });
        Ok(Self(Proxy::new(handle, true, PaintNative)?))
    }

    /// A new paint with the same settings. Effects are shared, not copied.
    pub fn clone_paint(&self) -> Result<Self> {
        let source = self.raw()?;
        // SAFETY: the source is live while the proxy is.
        let handle = Handle::from_mut_ptr(unsafe { sk_paint_clone(source) });
        Ok(Self(Proxy::new(handle, true, PaintNative)?))
    }

    /// A paint handed to a callback by native code, valid for the guard's lifetime.
    pub fn borrowed(handle: Handle) -> Result<Option<Borrowed<Paint>>> {
        Borrowed::from_native(handle, |_, _| Ok(PaintNative))
    }

    pub(crate) fn raw(&self) -> Result<*mut sk_paint_t> {
        Ok(self.try_handle()?.as_ptr())
    }

    pub fn reset(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_paint_reset(self.raw()?) };
        Ok(())
    }

    pub fn color(&self) -> Result<Color> {
        // SAFETY: live while the proxy is.
        Ok(Color(unsafe { sk_paint_get_color(self.raw()?) }))
    }

    pub fn set_color(&self, color: Color) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_paint_set_color(self.raw()?, color.0) };
        Ok(())
    }

    pub fn is_anti_alias(&self) -> Result<bool> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_paint_is_antialias(self.raw()?) })
    }

    pub fn set_anti_alias(&self, anti_alias: bool) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_paint_set_antialias(self.raw()?, anti_alias) };
        Ok(())
    }

    pub fn style(&self) -> Result<PaintStyle> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_paint_get_style(self.raw()?) }.into())
    }

    pub fn set_style(&self, style: PaintStyle) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_paint_set_style(self.raw()?, style.into()) };
        Ok(())
    }

    pub fn stroke_width(&self) -> Result<f32> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_paint_get_stroke_width(self.raw()?) })
    }

    pub fn set_stroke_width(&self, width: f32) -> Result<()> {
        if !(width >= 0.0 && width.is_finite()) {
            return Err(Error::invalid_argument("width", "stroke width must be finite and non-negative"));
        }
        // SAFETY: live while the proxy is.
        unsafe { sk_paint_set_stroke_width(self.raw()?, width) };
        Ok(())
    }

    // =========================================================================
    // Effects
    //
    // Setters reference the effect natively. Getters receive a new reference
    // and hand it to the registry, which releases it if the effect already
    // has a proxy.
    // =========================================================================

    pub fn shader(&self) -> Result<Option<Shader>> {
        // SAFETY: live while the proxy is.
        let shader = unsafe { sk_paint_get_shader(self.raw()?) };
        Shader::from_native(Handle::from_mut_ptr(shader), true, true)
    }

    pub fn set_shader(&self, shader: Option<&Shader>) -> Result<()> {
        let paint = self.raw()?;
        let shader = match shader {
            Some(shader) => shader.try_handle()?.as_ptr(),
            None => std::ptr::null_mut(),
        };
        // SAFETY: both are live or null.
        unsafe { sk_paint_set_shader(paint, shader) };
        Ok(())
    }

    pub fn image_filter(&self) -> Result<Option<ImageFilter>> {
        // SAFETY: live while the proxy is.
        let filter = unsafe { sk_paint_get_imagefilter(self.raw()?) };
        ImageFilter::from_native(Handle::from_mut_ptr(filter), true, true)
    }

    pub fn set_image_filter(&self, filter: Option<&ImageFilter>) -> Result<()> {
        let paint = self.raw()?;
        let filter = match filter {
            Some(filter) => filter.try_handle()?.as_ptr(),
            None => std::ptr::null_mut(),
        };
        // SAFETY: both are live or null.
        unsafe { sk_paint_set_imagefilter(paint, filter) };
        Ok(())
    }

    pub fn blender(&self) -> Result<Option<Blender>> {
        // SAFETY: live while the proxy is.
        let blender = unsafe { sk_paint_get_blender(self.raw()?) };
        Blender::from_native(Handle::from_mut_ptr(blender), true, true)
    }

    pub fn set_blender(&self, blender: Option<&Blender>) -> Result<()> {
        let paint = self.raw()?;
        let blender = match blender {
            Some(blender) => blender.try_handle()?.as_ptr(),
            None => std::ptr::null_mut(),
        };
        // SAFETY: both are live or null.
        unsafe { sk_paint_set_blender(paint, blender) };
        Ok(())
    }
}
