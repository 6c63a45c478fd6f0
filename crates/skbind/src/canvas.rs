//! Canvases
//!
//! All canvas types share their drawing surface through [`CanvasOps`], which
//! is implemented for anything wrapping a native canvas handle.

use crate::paint::Paint;
use crate::types::{BlendMode, ClipOp, Matrix, Rect};
use crate::vertices::Vertices;
use skbind_core::{Error, Handle, HandleRegistry, NativeKind, NativeWrapper, Proxy, Result};
use skbind_native::{
    sk_canvas_clip_rect_with_operation, sk_canvas_concat, sk_canvas_destroy, sk_canvas_draw_oval,
    sk_canvas_draw_paint, sk_canvas_draw_rect, sk_canvas_draw_vertices, sk_canvas_flush,
    sk_canvas_get_device_clip_bounds, sk_canvas_get_save_count, sk_canvas_get_total_matrix,
    sk_canvas_new_recording, sk_canvas_reset_matrix, sk_canvas_restore, sk_canvas_restore_to_count, sk_canvas_save,
    sk_canvas_save_layer, sk_canvas_scale, sk_canvas_set_matrix, sk_canvas_t, sk_canvas_translate, sk_matrix_t,
    sk_nway_canvas_add_canvas, sk_nway_canvas_new, sk_nway_canvas_remove_all, sk_nway_canvas_remove_canvas,
    sk_rect_t,
};
use std::sync::Arc;

pub use skbind_native::DrawOp;

pub struct CanvasNative;

impl NativeKind for CanvasNative {
    const TYPE_NAME: &'static str = "Canvas";

    fn dispose_native(&self, handle: Handle) {
        // SAFETY: owned canvases are destroyed exactly once, by their proxy.
        unsafe { sk_canvas_destroy(handle.as_ptr()) }
    }
}

fn check_size(width: i32, height: i32) -> Result<()> {
    if width < 0 || height < 0 {
        return Err(Error::invalid_argument("size", format!("{width}x{height} is negative")));
    }
    Ok(())
}

fn created(handle: Handle) -> Result<Arc<Proxy<CanvasNative>>> {
    HandleRegistry::global().acquire_created(handle, |_, _| Ok(CanvasNative))
}

// =============================================================================
// Drawing
// =============================================================================

/// Drawing calls shared by every canvas wrapper.
///
/// Every call fails with [`Error::ObjectDisposed`] once the canvas has been
/// disposed, and paints and vertices are checked the same way.
pub trait CanvasOps: NativeWrapper {
    fn raw_canvas(&self) -> Result<*mut sk_canvas_t> {
        Ok(self.try_handle()?.as_ptr())
    }

    /// Saves the matrix and returns the save count before the call.
    fn save(&self) -> Result<i32> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_canvas_save(self.raw_canvas()?) })
    }

    fn save_layer(&self, bounds: Option<Rect>, paint: Option<&Paint>) -> Result<i32> {
        let canvas = self.raw_canvas()?;
        let paint = match paint {
            Some(paint) => paint.raw()? as *const _,
            None => std::ptr::null(),
        };
        let bounds = bounds.map(sk_rect_t::from);
        let bounds = bounds.as_ref().map_or(std::ptr::null(), |b| b as *const sk_rect_t);
        // SAFETY: every pointer is live or null for the call.
        Ok(unsafe { sk_canvas_save_layer(canvas, bounds, paint) })
    }

    fn restore(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_restore(self.raw_canvas()?) };
        Ok(())
    }

    fn restore_to_count(&self, count: i32) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_restore_to_count(self.raw_canvas()?, count) };
        Ok(())
    }

    fn save_count(&self) -> Result<i32> {
        // SAFETY: live while the proxy is.
        Ok(unsafe { sk_canvas_get_save_count(self.raw_canvas()?) })
    }

    fn translate(&self, dx: f32, dy: f32) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_translate(self.raw_canvas()?, dx, dy) };
        Ok(())
    }

    fn scale(&self, sx: f32, sy: f32) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_scale(self.raw_canvas()?, sx, sy) };
        Ok(())
    }

    fn concat(&self, matrix: &Matrix) -> Result<()> {
        let matrix = sk_matrix_t::from(*matrix);
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_concat(self.raw_canvas()?, &matrix) };
        Ok(())
    }

    fn set_matrix(&self, matrix: &Matrix) -> Result<()> {
        let matrix = sk_matrix_t::from(*matrix);
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_set_matrix(self.raw_canvas()?, &matrix) };
        Ok(())
    }

    fn reset_matrix(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_reset_matrix(self.raw_canvas()?) };
        Ok(())
    }

    fn total_matrix(&self) -> Result<Matrix> {
        let mut matrix = sk_matrix_t::IDENTITY;
        // SAFETY: live while the proxy is; `matrix` is written in place.
        unsafe { sk_canvas_get_total_matrix(self.raw_canvas()?, &mut matrix) };
        Ok(matrix.into())
    }

    fn device_clip_bounds(&self) -> Result<Rect> {
        let mut bounds = sk_rect_t::from(Rect::default());
        // SAFETY: as above.
        unsafe { sk_canvas_get_device_clip_bounds(self.raw_canvas()?, &mut bounds) };
        Ok(bounds.into())
    }

    fn clip_rect(&self, rect: Rect, op: ClipOp, anti_alias: bool) -> Result<()> {
        let rect = sk_rect_t::from(rect);
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_clip_rect_with_operation(self.raw_canvas()?, &rect, op.into(), anti_alias) };
        Ok(())
    }

    fn draw_paint(&self, paint: &Paint) -> Result<()> {
        let canvas = self.raw_canvas()?;
        // SAFETY: both are live for the call.
        unsafe { sk_canvas_draw_paint(canvas, paint.raw()?) };
        Ok(())
    }

    fn draw_rect(&self, rect: Rect, paint: &Paint) -> Result<()> {
        let canvas = self.raw_canvas()?;
        let rect = sk_rect_t::from(rect);
        // SAFETY: both are live for the call.
        unsafe { sk_canvas_draw_rect(canvas, &rect, paint.raw()?) };
        Ok(())
    }

    fn draw_oval(&self, rect: Rect, paint: &Paint) -> Result<()> {
        let canvas = self.raw_canvas()?;
        let rect = sk_rect_t::from(rect);
        // SAFETY: both are live for the call.
        unsafe { sk_canvas_draw_oval(canvas, &rect, paint.raw()?) };
        Ok(())
    }

    fn draw_vertices(&self, vertices: &Vertices, mode: BlendMode, paint: &Paint) -> Result<()> {
        let canvas = self.raw_canvas()?;
        let vertices = vertices.try_handle()?;
        // SAFETY: all three are live for the call.
        unsafe { sk_canvas_draw_vertices(canvas, vertices.as_ptr(), mode.to_native(), paint.raw()?) };
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_canvas_flush(self.raw_canvas()?) };
        Ok(())
    }
}

// =============================================================================
// Canvas
// =============================================================================

native_wrapper! {
    /// A canvas created by this library or handed over by native code.
    pub struct Canvas(CanvasNative);
}

impl CanvasOps for Canvas {}

impl Canvas {
    /// A canvas that records every call it receives.
    pub fn new(width: i32, height: i32) -> Result<Self> {
        check_size(width, height)?;
        // SAFETY: the size was checked.
        let handle = Handle::from_mut_ptr(unsafe { sk_canvas_new_recording(width, height) });
        Ok(Self(created(handle)?))
    }

    /// A canvas that draws nothing.
    pub fn null() -> Result<Self> {
        // SAFETY: no preconditions. Without targets an n-way canvas drops every call.
        let handle = Handle::from_mut_ptr(unsafe { sk_nway_canvas_new(0, 0) });
        Ok(Self(created(handle)?))
    }

    /// The proxy for `handle`. Canvases are not reference-counted, so
    /// `unref_existing` only matters for symmetry with other families.
    pub fn from_native(handle: Handle, owns: bool, unref_existing: bool) -> Result<Option<Self>> {
        let proxy = HandleRegistry::global().get_or_add(handle, owns, unref_existing, |_, _| Ok(CanvasNative))?;
        Ok(proxy.map(Self))
    }

    /// The calls this canvas has recorded. Fails for canvases that do not
    /// record.
    pub fn recorded_ops(&self) -> Result<Vec<DrawOp>> {
        let handle = self.try_handle()?;
        skbind_native::debug::recorded_ops(handle.raw())
            .ok_or_else(|| Error::InvalidOperation("not a recording canvas".into()))
    }
}

// =============================================================================
// N-way canvas
// =============================================================================

native_wrapper! {
    /// Forwards every call to the canvases added to it.
    ///
    /// Added canvases are kept alive until they are removed or this canvas
    /// is disposed.
    pub struct NWayCanvas(CanvasNative);
}

impl CanvasOps for NWayCanvas {}

impl NWayCanvas {
    pub fn new(width: i32, height: i32) -> Result<Self> {
        check_size(width, height)?;
        // SAFETY: the size was checked.
        let handle = Handle::from_mut_ptr(unsafe { sk_nway_canvas_new(width, height) });
        Ok(Self(created(handle)?))
    }

    pub fn add_canvas<C: CanvasOps>(&self, canvas: &C) -> Result<()> {
        let this = self.raw_canvas()?;
        let child = canvas.raw_canvas()?;
        // SAFETY: both canvases are live.
        unsafe { sk_nway_canvas_add_canvas(this, child) };
        self.0.pin_kept_alive(canvas.as_managed());
        Ok(())
    }

    pub fn remove_canvas<C: CanvasOps>(&self, canvas: &C) -> Result<()> {
        let this = self.raw_canvas()?;
        let child = canvas.try_handle()?;
        // SAFETY: `this` is live; `child` is only compared.
        unsafe { sk_nway_canvas_remove_canvas(this, child.as_ptr()) };
        self.0.core().unpin_kept_alive(child);
        Ok(())
    }

    pub fn remove_all(&self) -> Result<()> {
        // SAFETY: live while the proxy is.
        unsafe { sk_nway_canvas_remove_all(self.raw_canvas()?) };
        let released = self.0.core().clear_kept_alive();
        tracing::trace!(target: "skbind::canvas", released, "n-way canvas removed all targets");
        Ok(())
    }

    pub fn canvas_count(&self) -> usize {
        self.0.core().kept_alive_count()
    }
}

// =============================================================================
// AutoCanvasRestore
// =============================================================================

/// Restores a canvas to the save count it had when the guard was created.
///
/// ```ignore
/// {
///     let _restore = AutoCanvasRestore::new(&canvas, true)?;
///     canvas.translate(10.0, 10.0)?;
/// } // matrix restored here
/// ```
pub struct AutoCanvasRestore<'a, C: CanvasOps> {
    canvas: Option<&'a C>,
    save_count: i32,
}

impl<'a, C: CanvasOps> AutoCanvasRestore<'a, C> {
    pub fn new(canvas: &'a C, do_save: bool) -> Result<Self> {
        let save_count = canvas.save_count()?;
        if do_save {
            canvas.save()?;
        }
        Ok(Self {
            canvas: Some(canvas),
            save_count,
        })
    }

    /// Restores now instead of on drop.
    pub fn restore(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            if let Err(err) = canvas.restore_to_count(self.save_count) {
                tracing::debug!(target: "skbind::canvas", %err, "auto restore skipped");
            }
        }
    }
}

impl<C: CanvasOps> Drop for AutoCanvasRestore<'_, C> {
    fn drop(&mut self) {
        self.restore();
    }
}
