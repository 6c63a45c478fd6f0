//! Vertices
//!
//! Vertices are reference-counted without a vtable on the native side, so
//! they are released through their own `sk_vertices_unref` rather than the
//! shared entry points.

use crate::types::{Color, Point, VertexMode};
use skbind_core::refcnt::{self, RefCounted, RefCounting};
use skbind_core::{Error, Handle, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_color_t, sk_nvrefcnt_t, sk_nvrefcnt_unique, sk_point_t, sk_vertices_get_index_count,
    sk_vertices_get_vertex_count, sk_vertices_make_copy, sk_vertices_ref, sk_vertices_t, sk_vertices_unref,
};

/// Counting through `sk_vertices_ref`/`sk_vertices_unref`.
pub struct VerticesRefCnt;

impl RefCounting for VerticesRefCnt {
    const VIRTUAL: bool = false;

    fn reference(handle: Handle) {
        // SAFETY: the handle refers to live vertices.
        unsafe { sk_vertices_ref(handle.as_ptr()) }
    }

    fn unreference(handle: Handle) {
        // SAFETY: as above.
        unsafe { sk_vertices_unref(handle.as_ptr()) }
    }

    fn is_unique(handle: Handle) -> bool {
        // SAFETY: as above.
        unsafe { sk_nvrefcnt_unique(handle.as_ptr::<sk_nvrefcnt_t>()) }
    }
}

pub struct VerticesNative;

impl NativeKind for VerticesNative {
    const TYPE_NAME: &'static str = "Vertices";
    const REGISTERED: bool = false;

    fn dispose_native(&self, handle: Handle) {
        refcnt::safe_unref::<Self>(handle);
    }

    fn release_redundant_ref(handle: Handle) {
        refcnt::safe_unref::<Self>(handle);
    }
}

impl RefCounted for VerticesNative {
    type Counting = VerticesRefCnt;
}

native_wrapper! {
    /// An immutable triangle mesh.
    pub struct Vertices(VerticesNative);
}

fn check_len(name: &'static str, len: usize, expected: usize) -> Result<()> {
    if len == expected {
        Ok(())
    } else {
        Err(Error::invalid_argument(
            name,
            format!("expected {expected} entries, got {len}"),
        ))
    }
}

impl Vertices {
    /// Copies the mesh data into a new native object.
    ///
    /// `tex_coords` and `colors`, when given, must have one entry per
    /// position; every index must refer to a position.
    pub fn copy(
        mode: VertexMode,
        positions: &[Point],
        tex_coords: Option<&[Point]>,
        colors: Option<&[Color]>,
        indices: Option<&[u16]>,
    ) -> Result<Self> {
        let vertex_count =
            i32::try_from(positions.len()).map_err(|_| Error::invalid_argument("positions", "too many vertices"))?;
        if let Some(tex_coords) = tex_coords {
            check_len("tex_coords", tex_coords.len(), positions.len())?;
        }
        if let Some(colors) = colors {
            check_len("colors", colors.len(), positions.len())?;
        }
        let indices = indices.unwrap_or(&[]);
        let index_count =
            i32::try_from(indices.len()).map_err(|_| Error::invalid_argument("indices", "too many indices"))?;
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(Error::invalid_argument("indices", format!("index {bad} is out of range")));
        }

        let positions: &[sk_point_t] = bytemuck::cast_slice(positions);
        let tex_coords: Option<&[sk_point_t]> = tex_coords.map(bytemuck::cast_slice);
        let colors: Option<&[sk_color_t]> = colors.map(bytemuck::cast_slice);
        // SAFETY: every pointer is null or covers the validated count.
        let handle = Handle::from_mut_ptr(unsafe {
            sk_vertices_make_copy(
                mode.into(),
                vertex_count,
                positions.as_ptr(),
                tex_coords.map_or(std::ptr::null(), <[sk_point_t]>::as_ptr),
                colors.map_or(std::ptr::null(), <[sk_color_t]>::as_ptr),
                index_count,
                if indices.is_empty() { std::ptr::null() } else { indices.as_ptr() },
            )
        });
        Ok(Self(Proxy::new(handle, true, VerticesNative)?))
    }

    pub fn vertex_count(&self) -> Result<usize> {
        let handle = self.try_handle()?;
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_vertices_get_vertex_count(handle.as_ptr::<sk_vertices_t>()) }.max(0) as usize)
    }

    pub fn index_count(&self) -> Result<usize> {
        let handle = self.try_handle()?;
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_vertices_get_index_count(handle.as_ptr::<sk_vertices_t>()) }.max(0) as usize)
    }

    pub fn is_unique(&self) -> Result<bool> {
        Ok(refcnt::is_unique::<VerticesNative>(self.try_handle()?))
    }
}
