//! Vertices: immutable mesh data with a non-virtual reference count.

use crate::heap::{self, ObjectKind};
use crate::refcnt::{ref_nv, unref_nv, NvRefCnt};
use crate::types::{sk_color_t, sk_point_t, sk_vertices_t, sk_vertices_vertex_mode_t};
use std::slice;

#[repr(C)]
pub(crate) struct Vertices {
    refs: NvRefCnt,
    pub(crate) mode: sk_vertices_vertex_mode_t,
    pub(crate) positions: Vec<sk_point_t>,
    pub(crate) tex_coords: Vec<sk_point_t>,
    pub(crate) colors: Vec<sk_color_t>,
    pub(crate) indices: Vec<u16>,
}

unsafe fn copy_slice<T: Copy>(ptr: *const T, len: usize) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        Vec::new()
    } else {
        slice::from_raw_parts(ptr, len).to_vec()
    }
}

/// Copies the given arrays. `tex_coords` and `colors` may be null, otherwise
/// they hold `vertex_count` entries.
#[no_mangle]
pub unsafe extern "C" fn sk_vertices_make_copy(
    mode: sk_vertices_vertex_mode_t,
    vertex_count: i32,
    positions: *const sk_point_t,
    tex_coords: *const sk_point_t,
    colors: *const sk_color_t,
    index_count: i32,
    indices: *const u16,
) -> *mut sk_vertices_t {
    if vertex_count < 0 || index_count < 0 || (vertex_count > 0 && positions.is_null()) {
        return std::ptr::null_mut();
    }
    if index_count > 0 && indices.is_null() {
        return std::ptr::null_mut();
    }
    let vertex_count = vertex_count as usize;
    let indices = copy_slice(indices, index_count as usize);
    if indices.iter().any(|&i| i as usize >= vertex_count) {
        return std::ptr::null_mut();
    }
    let vertices = Vertices {
        refs: NvRefCnt::new(),
        mode,
        positions: copy_slice(positions, vertex_count),
        tex_coords: copy_slice(tex_coords, vertex_count),
        colors: copy_slice(colors, vertex_count),
        indices,
    };
    heap::alloc(ObjectKind::Vertices, vertices) as *mut sk_vertices_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_vertices_ref(vertices: *mut sk_vertices_t) {
    if !vertices.is_null() {
        ref_nv(vertices as *mut NvRefCnt);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_vertices_unref(vertices: *mut sk_vertices_t) {
    if !vertices.is_null() && unref_nv(vertices as *mut NvRefCnt) {
        heap::free(vertices as *mut Vertices);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_vertices_get_vertex_count(vertices: *const sk_vertices_t) -> i32 {
    if !heap::check_live(vertices as usize, "vertices_get_vertex_count") {
        return 0;
    }
    (*(vertices as *const Vertices)).positions.len() as i32
}

#[no_mangle]
pub unsafe extern "C" fn sk_vertices_get_index_count(vertices: *const sk_vertices_t) -> i32 {
    if !heap::check_live(vertices as usize, "vertices_get_index_count") {
        return 0;
    }
    (*(vertices as *const Vertices)).indices.len() as i32
}
