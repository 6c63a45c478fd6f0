//! Native handles

use std::fmt;

/// Opaque, address-sized token identifying a native object.
///
/// Handles carry no lifetime information: the native side may reuse a value
/// once the object behind it is destroyed. [`Handle::NULL`] means "no object".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Handle(usize);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub fn from_mut_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Reinterprets the handle as a pointer to the given native type.
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::default().is_null());
        assert!(Handle::from_ptr(std::ptr::null::<u8>()).is_null());
        assert!(!Handle::from_raw(0x1000).is_null());
    }

    #[test]
    fn test_handle_formatting() {
        let handle = Handle::from_raw(0x1000);
        assert_eq!(handle.to_string(), "0x1000");
        assert_eq!(format!("{handle:?}"), "Handle(0x1000)");
    }

    #[test]
    fn test_pointer_round_trip() {
        let value = 7u32;
        let handle = Handle::from_ptr(&value as *const u32);
        assert_eq!(handle.as_ptr::<u32>() as *const u32, &value as *const u32);
    }
}
