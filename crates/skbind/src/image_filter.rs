//! Image filters
//!
//! Filters form immutable trees. The native side references each input, so a
//! filter stays valid when the wrappers of its inputs are disposed.

use skbind_core::{Error, Handle, HandleRegistry, NativeWrapper, Result};
use skbind_native::{
    sk_imagefilter_count_inputs, sk_imagefilter_get_input, sk_imagefilter_new_blur, sk_imagefilter_new_compose,
    sk_imagefilter_new_offset, sk_imagefilter_t,
};

virtual_ref_counted_kind! {
    pub struct ImageFilterNative = "ImageFilter";
}

native_wrapper! {
    pub struct ImageFilter(ImageFilterNative);
}

fn input_handle(input: Option<&ImageFilter>) -> Result<*mut sk_imagefilter_t> {
    match input {
        Some(filter) => Ok(filter.try_handle()?.as_ptr()),
        None => Ok(std::ptr::null_mut()),
    }
}

impl ImageFilter {
    pub fn blur(sigma_x: f32, sigma_y: f32, input: Option<&ImageFilter>) -> Result<Self> {
        if !(sigma_x >= 0.0 && sigma_y >= 0.0) {
            return Err(Error::invalid_argument("sigma", "blur sigmas must be non-negative"));
        }
        let input = input_handle(input)?;
        // SAFETY: `input` is null or a live filter; the native side takes its own reference.
        let handle = Handle::from_mut_ptr(unsafe { sk_imagefilter_new_blur(sigma_x, sigma_y, input) });
        Self::from_created(handle)
    }

    pub fn offset(dx: f32, dy: f32, input: Option<&ImageFilter>) -> Result<Self> {
        if !(dx.is_finite() && dy.is_finite()) {
            return Err(Error::invalid_argument("offset", "offsets must be finite"));
        }
        let input = input_handle(input)?;
        // SAFETY: as for `blur`.
        let handle = Handle::from_mut_ptr(unsafe { sk_imagefilter_new_offset(dx, dy, input) });
        Self::from_created(handle)
    }

    /// Applies `inner`, then `outer`. At least one must be given.
    pub fn compose(outer: Option<&ImageFilter>, inner: Option<&ImageFilter>) -> Result<Self> {
        if outer.is_none() && inner.is_none() {
            return Err(Error::NullArgument("outer"));
        }
        let (outer, inner) = (input_handle(outer)?, input_handle(inner)?);
        // SAFETY: as for `blur`.
        let handle = Handle::from_mut_ptr(unsafe { sk_imagefilter_new_compose(outer, inner) });
        Self::from_created(handle)
    }

    fn from_created(handle: Handle) -> Result<Self> {
        Ok(Self(HandleRegistry::global().acquire_created(handle, |_, _| Ok(ImageFilterNative))?))
    }

    pub fn from_native(handle: Handle, owns: bool, unref_existing: bool) -> Result<Option<Self>> {
        let proxy =
            HandleRegistry::global().get_or_add(handle, owns, unref_existing, |_, _| Ok(ImageFilterNative))?;
        Ok(proxy.map(Self))
    }

    pub fn input_count(&self) -> Result<usize> {
        let handle = self.try_handle()?;
        // SAFETY: the handle is live while the proxy is.
        let count = unsafe { sk_imagefilter_count_inputs(handle.as_ptr::<sk_imagefilter_t>()) };
        Ok(count.max(0) as usize)
    }

    /// Input `index`, which may be absent. The native getter returns a new
    /// reference, released again when a proxy for the input already exists.
    pub fn input(&self, index: usize) -> Result<Option<ImageFilter>> {
        let handle = self.try_handle()?;
        let index = i32::try_from(index).map_err(|_| Error::invalid_argument("index", "out of range"))?;
        // SAFETY: the handle is live while the proxy is.
        let input = unsafe { sk_imagefilter_get_input(handle.as_ptr::<sk_imagefilter_t>(), index) };
        Self::from_native(Handle::from_mut_ptr(input), true, true)
    }
}
