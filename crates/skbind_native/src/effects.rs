//! Shaders, blenders and image filters: immutable, virtually ref-counted.

use crate::heap::{self, ObjectKind};
use crate::refcnt::{ref_base, unref_base, RefCntBase};
use crate::types::{sk_blender_t, sk_blendmode_t, sk_color_t, sk_imagefilter_t, sk_shader_t};
use std::sync::{Mutex, PoisonError};

/// Highest valid `sk_blendmode_t` value.
pub const LAST_BLEND_MODE: sk_blendmode_t = 28;

// ============================================================================
// Shader
// ============================================================================

#[repr(C)]
pub(crate) struct Shader {
    base: RefCntBase,
    pub(crate) kind: ShaderKind,
}

pub(crate) enum ShaderKind {
    Empty,
    Color(sk_color_t),
    Runtime {
        effect: *mut RefCntBase,
        uniforms: Vec<u8>,
        children: Vec<*mut RefCntBase>,
    },
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let ShaderKind::Runtime {
            effect, children, ..
        } = &self.kind
        {
            // SAFETY: the shader holds one reference on each of these.
            unsafe {
                unref_base(*effect);
                for child in children.iter().filter(|c| !c.is_null()) {
                    unref_base(*child);
                }
            }
        }
    }
}

unsafe fn destroy_shader(base: *mut RefCntBase) {
    heap::free(base as *mut Shader);
}

/// Takes ownership of the references held by `kind`.
pub(crate) fn new_shader(kind: ShaderKind) -> *mut sk_shader_t {
    heap::alloc(
        ObjectKind::Shader,
        Shader {
            base: RefCntBase::new(destroy_shader),
            kind,
        },
    ) as *mut sk_shader_t
}

/// The shared empty shader. Holds a reference so it is never destroyed.
static EMPTY_SHADER: Mutex<usize> = Mutex::new(0);

/// Returns a new reference to the shared empty shader.
#[no_mangle]
pub unsafe extern "C" fn sk_shader_new_empty() -> *mut sk_shader_t {
    let mut empty = EMPTY_SHADER.lock().unwrap_or_else(PoisonError::into_inner);
    if *empty == 0 {
        *empty = new_shader(ShaderKind::Empty) as usize;
    }
    let shader = *empty as *mut sk_shader_t;
    ref_base(shader as *mut RefCntBase);
    shader
}

#[no_mangle]
pub unsafe extern "C" fn sk_shader_new_color(color: sk_color_t) -> *mut sk_shader_t {
    new_shader(ShaderKind::Color(color))
}

#[no_mangle]
pub unsafe extern "C" fn sk_shader_ref(shader: *mut sk_shader_t) {
    if !shader.is_null() {
        ref_base(shader as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_shader_unref(shader: *mut sk_shader_t) {
    if !shader.is_null() {
        unref_base(shader as *mut RefCntBase);
    }
}

// ============================================================================
// Blender
// ============================================================================

#[repr(C)]
pub(crate) struct Blender {
    base: RefCntBase,
    pub(crate) kind: BlenderKind,
}

pub(crate) enum BlenderKind {
    Mode(sk_blendmode_t),
    Arithmetic {
        k: [f32; 4],
        enforce_premul: bool,
    },
}

unsafe fn destroy_blender(base: *mut RefCntBase) {
    heap::free(base as *mut Blender);
}

fn new_blender(kind: BlenderKind) -> *mut sk_blender_t {
    heap::alloc(
        ObjectKind::Blender,
        Blender {
            base: RefCntBase::new(destroy_blender),
            kind,
        },
    ) as *mut sk_blender_t
}

const MODE_COUNT: usize = LAST_BLEND_MODE as usize + 1;

/// One shared blender per mode. The table holds a reference on each, so they
/// are never destroyed.
static MODE_BLENDERS: Mutex<[usize; MODE_COUNT]> = Mutex::new([0; MODE_COUNT]);

/// Returns a new reference to the shared blender for `mode`.
#[no_mangle]
pub unsafe extern "C" fn sk_blender_new_mode(mode: sk_blendmode_t) -> *mut sk_blender_t {
    let Ok(index) = usize::try_from(mode) else {
        return std::ptr::null_mut();
    };
    let mut blenders = MODE_BLENDERS.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(slot) = blenders.get_mut(index) else {
        return std::ptr::null_mut();
    };
    if *slot == 0 {
        *slot = new_blender(BlenderKind::Mode(mode)) as usize;
    }
    let blender = *slot as *mut sk_blender_t;
    ref_base(blender as *mut RefCntBase);
    blender
}

#[no_mangle]
pub unsafe extern "C" fn sk_blender_new_arithmetic(
    k1: f32,
    k2: f32,
    k3: f32,
    k4: f32,
    enforce_premul: bool,
) -> *mut sk_blender_t {
    let k = [k1, k2, k3, k4];
    if k.iter().any(|v| !v.is_finite()) {
        return std::ptr::null_mut();
    }
    new_blender(BlenderKind::Arithmetic { k, enforce_premul })
}

#[no_mangle]
pub unsafe extern "C" fn sk_blender_unref(blender: *mut sk_blender_t) {
    if !blender.is_null() {
        unref_base(blender as *mut RefCntBase);
    }
}

// ============================================================================
// Image filter
// ============================================================================

#[repr(C)]
pub(crate) struct ImageFilter {
    base: RefCntBase,
    pub(crate) kind: FilterKind,
    /// Each non-null input carries one reference owned by this filter.
    inputs: Vec<*mut ImageFilter>,
}

pub(crate) enum FilterKind {
    Blur { sigma_x: f32, sigma_y: f32 },
    Offset { dx: f32, dy: f32 },
    Compose,
}

impl Drop for ImageFilter {
    fn drop(&mut self) {
        for input in self.inputs.iter().filter(|i| !i.is_null()) {
            // SAFETY: see `inputs`.
            unsafe { unref_base(*input as *mut RefCntBase) };
        }
    }
}

unsafe fn destroy_image_filter(base: *mut RefCntBase) {
    heap::free(base as *mut ImageFilter);
}

/// Refs every non-null input and builds the filter.
unsafe fn new_image_filter(kind: FilterKind, inputs: Vec<*mut sk_imagefilter_t>) -> *mut sk_imagefilter_t {
    let inputs: Vec<*mut ImageFilter> = inputs
        .into_iter()
        .map(|input| {
            if !input.is_null() {
                ref_base(input as *mut RefCntBase);
            }
            input as *mut ImageFilter
        })
        .collect();
    heap::alloc(
        ObjectKind::ImageFilter,
        ImageFilter {
            base: RefCntBase::new(destroy_image_filter),
            kind,
            inputs,
        },
    ) as *mut sk_imagefilter_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_new_blur(
    sigma_x: f32,
    sigma_y: f32,
    input: *mut sk_imagefilter_t,
) -> *mut sk_imagefilter_t {
    if !(sigma_x >= 0.0 && sigma_y >= 0.0) {
        return std::ptr::null_mut();
    }
    new_image_filter(FilterKind::Blur { sigma_x, sigma_y }, vec![input])
}

#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_new_offset(
    dx: f32,
    dy: f32,
    input: *mut sk_imagefilter_t,
) -> *mut sk_imagefilter_t {
    if !(dx.is_finite() && dy.is_finite()) {
        return std::ptr::null_mut();
    }
    new_image_filter(FilterKind::Offset { dx, dy }, vec![input])
}

#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_new_compose(
    outer: *mut sk_imagefilter_t,
    inner: *mut sk_imagefilter_t,
) -> *mut sk_imagefilter_t {
    if outer.is_null() && inner.is_null() {
        return std::ptr::null_mut();
    }
    new_image_filter(FilterKind::Compose, vec![outer, inner])
}

#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_count_inputs(filter: *const sk_imagefilter_t) -> i32 {
    if !heap::check_live(filter as usize, "imagefilter_count_inputs") {
        return 0;
    }
    (*(filter as *const ImageFilter)).inputs.len() as i32
}

/// Returns a new reference to input `index`, or null.
#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_get_input(
    filter: *const sk_imagefilter_t,
    index: i32,
) -> *mut sk_imagefilter_t {
    if !heap::check_live(filter as usize, "imagefilter_get_input") || index < 0 {
        return std::ptr::null_mut();
    }
    let filter = &*(filter as *const ImageFilter);
    match filter.inputs.get(index as usize) {
        Some(&input) if !input.is_null() => {
            ref_base(input as *mut RefCntBase);
            input as *mut sk_imagefilter_t
        }
        _ => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_imagefilter_unref(filter: *mut sk_imagefilter_t) {
    if !filter.is_null() {
        unref_base(filter as *mut RefCntBase);
    }
}
