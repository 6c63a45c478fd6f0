//! Inspection of native state for tests and diagnostics.
//!
//! Object ids are assigned at allocation and never reused, so a test can
//! capture an id before disposing a wrapper and ask afterwards how many times
//! that exact object was destroyed, even if its address was recycled.

use crate::canvas::{Canvas, DrawOp};
use crate::effects::{Blender, BlenderKind, FilterKind, ImageFilter, Shader, ShaderKind};
use crate::heap::{self, ObjectKind};
use crate::vertices::Vertices;

/// Whether `addr` is a live native object.
pub fn is_live(addr: usize) -> bool {
    heap::is_live(addr)
}

/// The allocation id of the live object at `addr`.
pub fn object_id(addr: usize) -> Option<u64> {
    heap::object_id(addr)
}

/// How many times the object with allocation id `id` has been destroyed.
pub fn destroy_count(id: u64) -> u32 {
    heap::destroy_count(id)
}

/// Destroys and reference-count operations that targeted a dead address.
pub fn double_free_count() -> u64 {
    heap::double_free_count()
}

pub fn live_count(kind: ObjectKind) -> usize {
    heap::live_count(kind)
}

/// The calls recorded by a live recording canvas.
pub fn recorded_ops(addr: usize) -> Option<Vec<DrawOp>> {
    if heap::kind_at(addr) != Some(ObjectKind::Canvas) {
        return None;
    }
    // SAFETY: live canvas addresses point at a `Canvas`.
    unsafe { (*(addr as *const Canvas)).recorded_ops() }
}

/// A short description of an immutable native object, for log output.
pub fn describe(addr: usize) -> Option<String> {
    // SAFETY: each cast matches the kind recorded for the address.
    unsafe {
        match heap::kind_at(addr)? {
            ObjectKind::Shader => Some(match &(*(addr as *const Shader)).kind {
                ShaderKind::Empty => "shader(empty)".to_string(),
                ShaderKind::Color(color) => format!("shader(color #{color:08x})"),
                ShaderKind::Runtime { uniforms, children, .. } => {
                    format!("shader(runtime, {} uniform bytes, {} children)", uniforms.len(), children.len())
                }
            }),
            ObjectKind::Blender => Some(match &(*(addr as *const Blender)).kind {
                BlenderKind::Mode(mode) => format!("blender(mode {mode})"),
                BlenderKind::Arithmetic { k, enforce_premul } => {
                    format!("blender(arithmetic {k:?}, premul {enforce_premul})")
                }
            }),
            ObjectKind::ImageFilter => Some(match &(*(addr as *const ImageFilter)).kind {
                FilterKind::Blur { sigma_x, sigma_y } => format!("imagefilter(blur {sigma_x}x{sigma_y})"),
                FilterKind::Offset { dx, dy } => format!("imagefilter(offset {dx},{dy})"),
                FilterKind::Compose => "imagefilter(compose)".to_string(),
            }),
            ObjectKind::Vertices => {
                let v = &*(addr as *const Vertices);
                Some(format!(
                    "vertices({:?}, {} positions, {} tex coords, {} colors, {} indices)",
                    v.mode,
                    v.positions.len(),
                    v.tex_coords.len(),
                    v.colors.len(),
                    v.indices.len()
                ))
            }
            _ => None,
        }
    }
}
