//! Owned, NUL-terminated byte strings.

use crate::heap::{self, ObjectKind};
use crate::types::sk_string_t;
use std::ffi::c_char;

pub(crate) struct SkString {
    /// Always ends with a NUL byte that is not part of the contents.
    bytes: Vec<u8>,
}

impl SkString {
    fn new(contents: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(contents.len() + 1);
        bytes.extend_from_slice(contents);
        bytes.push(0);
        Self { bytes }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    pub(crate) fn set(&mut self, contents: &[u8]) {
        *self = Self::new(contents);
    }
}

pub(crate) unsafe fn string_mut<'a>(string: *mut sk_string_t) -> Option<&'a mut SkString> {
    if heap::check_live(string as usize, "string") {
        Some(&mut *(string as *mut SkString))
    } else {
        None
    }
}

pub(crate) unsafe fn string_ref<'a>(string: *const sk_string_t) -> Option<&'a SkString> {
    if heap::check_live(string as usize, "string") {
        Some(&*(string as *const SkString))
    } else {
        None
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_string_new_empty() -> *mut sk_string_t {
    heap::alloc(ObjectKind::String, SkString::new(&[])) as *mut sk_string_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_string_new_with_copy(src: *const c_char, length: usize) -> *mut sk_string_t {
    let contents = if src.is_null() || length == 0 {
        &[][..]
    } else {
        std::slice::from_raw_parts(src as *const u8, length)
    };
    heap::alloc(ObjectKind::String, SkString::new(contents)) as *mut sk_string_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_string_destructor(string: *mut sk_string_t) {
    heap::free(string as *mut SkString);
}

#[no_mangle]
pub unsafe extern "C" fn sk_string_get_c_str(string: *const sk_string_t) -> *const c_char {
    match string_ref(string) {
        Some(string) => string.bytes.as_ptr() as *const c_char,
        None => std::ptr::null(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_string_get_size(string: *const sk_string_t) -> usize {
    string_ref(string).map_or(0, |s| s.as_bytes().len())
}
