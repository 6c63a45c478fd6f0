//! Native strings

use skbind_core::{Handle, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_string_destructor, sk_string_get_c_str, sk_string_get_size, sk_string_new_empty, sk_string_new_with_copy,
    sk_string_t,
};
use std::ffi::c_char;

pub struct StringNative;

impl NativeKind for StringNative {
    const TYPE_NAME: &'static str = "SkString";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        // SAFETY: owned strings are destroyed exactly once, by their proxy.
        unsafe { sk_string_destructor(handle.as_ptr()) }
    }
}

native_wrapper! {
    /// An owned native byte string, used to pass source text in and error
    /// messages out.
    pub struct SkString(StringNative);
}

impl SkString {
    pub fn new() -> Result<Self> {
        // SAFETY: no preconditions.
        let handle = Handle::from_mut_ptr(unsafe { sk_string_new_empty() });
        Ok(Self(Proxy::new(handle, true, StringNative)?))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        // SAFETY: the pointer and length describe `text`, which is copied.
        let handle = Handle::from_mut_ptr(unsafe { sk_string_new_with_copy(text.as_ptr() as *const c_char, text.len()) });
        Ok(Self(Proxy::new(handle, true, StringNative)?))
    }

    pub fn len(&self) -> Result<usize> {
        let handle = self.try_handle()?;
        // SAFETY: the handle is live while the proxy is.
        Ok(unsafe { sk_string_get_size(handle.as_ptr::<sk_string_t>()) })
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The contents, with invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> Result<String> {
        let handle = self.try_handle()?;
        let string = handle.as_ptr::<sk_string_t>();
        // SAFETY: the handle is live while the proxy is; the native buffer
        // holds `size` bytes before its terminator.
        let bytes = unsafe {
            let data = sk_string_get_c_str(string);
            let size = sk_string_get_size(string);
            if data.is_null() || size == 0 {
                &[][..]
            } else {
                std::slice::from_raw_parts(data as *const u8, size)
            }
        };
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skbind_core::Error;

    #[test]
    fn test_text_is_copied() {
        let string = SkString::from_text("half4 main()").unwrap();
        assert_eq!(string.len().unwrap(), 12);
        assert_eq!(string.to_string_lossy().unwrap(), "half4 main()");
        assert!(SkString::new().unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_disposed_string_is_unreadable() {
        let string = SkString::from_text("x").unwrap();
        let id = skbind_native::debug::object_id(string.handle().raw()).unwrap();
        string.dispose();
        assert_eq!(string.len(), Err(Error::ObjectDisposed("SkString")));
        assert_eq!(skbind_native::debug::destroy_count(id), 1);
    }
}
