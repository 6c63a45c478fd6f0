//! Paint: an owned object holding references to its shader, filter and blender.

use crate::heap::{self, ObjectKind};
use crate::refcnt::{ref_base, unref_base, RefCntBase};
use crate::types::{
    sk_blender_t, sk_color_t, sk_imagefilter_t, sk_paint_style_t, sk_paint_t, sk_shader_t,
};

pub(crate) struct Paint {
    pub(crate) color: sk_color_t,
    pub(crate) anti_alias: bool,
    pub(crate) style: sk_paint_style_t,
    pub(crate) stroke_width: f32,
    shader: *mut RefCntBase,
    image_filter: *mut RefCntBase,
    blender: *mut RefCntBase,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            color: 0xFF00_0000,
            anti_alias: false,
            style: sk_paint_style_t::Fill,
            stroke_width: 0.0,
            shader: std::ptr::null_mut(),
            image_filter: std::ptr::null_mut(),
            blender: std::ptr::null_mut(),
        }
    }
}

impl Drop for Paint {
    fn drop(&mut self) {
        for slot in [self.shader, self.image_filter, self.blender] {
            if !slot.is_null() {
                // SAFETY: each slot holds one reference.
                unsafe { unref_base(slot) };
            }
        }
    }
}

/// Replaces a ref-counted slot, taking a new reference on `value`.
unsafe fn replace_slot(slot: &mut *mut RefCntBase, value: *mut RefCntBase) {
    if !value.is_null() {
        ref_base(value);
    }
    let old = std::mem::replace(slot, value);
    if !old.is_null() {
        unref_base(old);
    }
}

/// Returns a new reference to the slot contents, or null.
unsafe fn ref_slot(slot: *mut RefCntBase) -> *mut RefCntBase {
    if !slot.is_null() {
        ref_base(slot);
    }
    slot
}

unsafe fn paint<'a>(paint: *const sk_paint_t, operation: &'static str) -> Option<&'a Paint> {
    if heap::check_live(paint as usize, operation) {
        Some(&*(paint as *const Paint))
    } else {
        None
    }
}

unsafe fn paint_mut<'a>(paint: *mut sk_paint_t, operation: &'static str) -> Option<&'a mut Paint> {
    if heap::check_live(paint as usize, operation) {
        Some(&mut *(paint as *mut Paint))
    } else {
        None
    }
}

/// Borrows a live paint for the duration of a draw call.
pub(crate) unsafe fn paint_ref<'a>(paint: *const sk_paint_t) -> Option<&'a Paint> {
    self::paint(paint, "draw")
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_new() -> *mut sk_paint_t {
    heap::alloc(ObjectKind::Paint, Paint::default()) as *mut sk_paint_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_clone(source: *const sk_paint_t) -> *mut sk_paint_t {
    let Some(source) = paint(source, "paint_clone") else {
        return std::ptr::null_mut();
    };
    let clone = Paint {
        color: source.color,
        anti_alias: source.anti_alias,
        style: source.style,
        stroke_width: source.stroke_width,
        shader: ref_slot(source.shader),
        image_filter: ref_slot(source.image_filter),
        blender: ref_slot(source.blender),
    };
    heap::alloc(ObjectKind::Paint, clone) as *mut sk_paint_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_delete(paint: *mut sk_paint_t) {
    heap::free(paint as *mut Paint);
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_reset(paint: *mut sk_paint_t) {
    if let Some(paint) = paint_mut(paint, "paint_reset") {
        *paint = Paint::default();
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_color(paint: *const sk_paint_t) -> sk_color_t {
    self::paint(paint, "paint_get_color").map_or(0, |p| p.color)
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_color(paint: *mut sk_paint_t, color: sk_color_t) {
    if let Some(paint) = paint_mut(paint, "paint_set_color") {
        paint.color = color;
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_is_antialias(paint: *const sk_paint_t) -> bool {
    self::paint(paint, "paint_is_antialias").map_or(false, |p| p.anti_alias)
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_antialias(paint: *mut sk_paint_t, anti_alias: bool) {
    if let Some(paint) = paint_mut(paint, "paint_set_antialias") {
        paint.anti_alias = anti_alias;
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_style(paint: *const sk_paint_t) -> sk_paint_style_t {
    self::paint(paint, "paint_get_style").map_or(sk_paint_style_t::Fill, |p| p.style)
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_style(paint: *mut sk_paint_t, style: sk_paint_style_t) {
    if let Some(paint) = paint_mut(paint, "paint_set_style") {
        paint.style = style;
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_stroke_width(paint: *const sk_paint_t) -> f32 {
    self::paint(paint, "paint_get_stroke_width").map_or(0.0, |p| p.stroke_width)
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_stroke_width(paint: *mut sk_paint_t, width: f32) {
    if let Some(paint) = paint_mut(paint, "paint_set_stroke_width") {
        if width >= 0.0 {
            paint.stroke_width = width;
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_shader(paint: *mut sk_paint_t, shader: *mut sk_shader_t) {
    if let Some(paint) = paint_mut(paint, "paint_set_shader") {
        replace_slot(&mut paint.shader, shader as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_shader(paint: *mut sk_paint_t) -> *mut sk_shader_t {
    match self::paint(paint, "paint_get_shader") {
        Some(paint) => ref_slot(paint.shader) as *mut sk_shader_t,
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_imagefilter(paint: *mut sk_paint_t, filter: *mut sk_imagefilter_t) {
    if let Some(paint) = paint_mut(paint, "paint_set_imagefilter") {
        replace_slot(&mut paint.image_filter, filter as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_imagefilter(paint: *mut sk_paint_t) -> *mut sk_imagefilter_t {
    match self::paint(paint, "paint_get_imagefilter") {
        Some(paint) => ref_slot(paint.image_filter) as *mut sk_imagefilter_t,
        None => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_set_blender(paint: *mut sk_paint_t, blender: *mut sk_blender_t) {
    if let Some(paint) = paint_mut(paint, "paint_set_blender") {
        replace_slot(&mut paint.blender, blender as *mut RefCntBase);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_paint_get_blender(paint: *mut sk_paint_t) -> *mut sk_blender_t {
    match self::paint(paint, "paint_get_blender") {
        Some(paint) => ref_slot(paint.blender) as *mut sk_blender_t,
        None => std::ptr::null_mut(),
    }
}
