//! Canvases.
//!
//! Three backends share one entry-point set:
//!
//! - **Recording** canvases keep a log of the calls they receive.
//! - **N-way** canvases forward every call to a list of canvases they do not own.
//! - **Managed callback** canvases forward every call to the procs registered
//!   with [`sk_managedcallbackcanvas_set_procs`], passing the context pointer
//!   given at construction. Destroying one always invokes the destroy proc.

use crate::heap::{self, ObjectKind};
use crate::matrix;
use crate::paint::paint_ref;
use crate::types::{
    sk_blendmode_t, sk_canvas_t, sk_clipop_t, sk_managedcallbackcanvas_procs_t, sk_matrix_t, sk_paint_t,
    sk_rect_t, sk_vertices_t,
};
use crate::vertices::Vertices;
use std::ffi::c_void;
use std::sync::{PoisonError, RwLock};

/// A call received by a recording canvas.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Save,
    SaveLayer { bounds: Option<sk_rect_t> },
    Restore,
    Translate { dx: f32, dy: f32 },
    Scale { sx: f32, sy: f32 },
    Concat(sk_matrix_t),
    SetMatrix(sk_matrix_t),
    ClipRect { rect: sk_rect_t, op: sk_clipop_t, anti_alias: bool },
    DrawPaint { color: u32 },
    DrawRect { rect: sk_rect_t, color: u32 },
    DrawOval { rect: sk_rect_t, color: u32 },
    DrawVertices { vertex_count: usize, mode: sk_blendmode_t, color: u32 },
    Flush,
}

pub(crate) struct Canvas {
    width: i32,
    height: i32,
    matrix: sk_matrix_t,
    save_stack: Vec<sk_matrix_t>,
    backend: Backend,
}

enum Backend {
    Recording(Vec<DrawOp>),
    NWay(Vec<*mut sk_canvas_t>),
    Callback(*mut c_void),
}

static CALLBACK_PROCS: RwLock<Option<sk_managedcallbackcanvas_procs_t>> = RwLock::new(None);

fn callback_procs() -> sk_managedcallbackcanvas_procs_t {
    CALLBACK_PROCS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .unwrap_or_default()
}

impl Canvas {
    fn new(width: i32, height: i32, backend: Backend) -> Self {
        Self {
            width,
            height,
            matrix: sk_matrix_t::IDENTITY,
            save_stack: Vec::new(),
            backend,
        }
    }

    fn save_count(&self) -> i32 {
        self.save_stack.len() as i32 + 1
    }

    pub(crate) fn recorded_ops(&self) -> Option<Vec<DrawOp>> {
        match &self.backend {
            Backend::Recording(ops) => Some(ops.clone()),
            _ => None,
        }
    }
}

impl Drop for Canvas {
    fn drop(&mut self) {
        if let Backend::Callback(context) = self.backend {
            if let Some(destroy) = callback_procs().destroy {
                let this = self as *mut Canvas as *mut sk_canvas_t;
                // SAFETY: the proc only receives the pointer as an identity.
                unsafe { destroy(this, context) };
            }
        }
    }
}

/// Where a call goes after the canvas state has been updated.
enum Route {
    Done,
    Forward(Vec<*mut sk_canvas_t>),
    Callback(*mut c_void, sk_managedcallbackcanvas_procs_t),
}

/// Updates the canvas and records `op`, releasing the canvas borrow before
/// the caller forwards the call anywhere else.
unsafe fn route(
    canvas: *mut sk_canvas_t,
    operation: &'static str,
    op: DrawOp,
    update: impl FnOnce(&mut Canvas),
) -> Option<Route> {
    if !heap::check_live(canvas as usize, operation) {
        return None;
    }
    let canvas = &mut *(canvas as *mut Canvas);
    update(canvas);
    Some(match &mut canvas.backend {
        Backend::Recording(ops) => {
            ops.push(op);
            Route::Done
        }
        Backend::NWay(children) => Route::Forward(children.clone()),
        Backend::Callback(context) => Route::Callback(*context, callback_procs()),
    })
}

/// Children an n-way canvas still points at; destroyed ones are skipped.
fn live_children(children: Vec<*mut sk_canvas_t>) -> impl Iterator<Item = *mut sk_canvas_t> {
    children.into_iter().filter(|child| {
        let live = heap::is_live(*child as usize);
        if !live {
            tracing::debug!(addr = *child as usize, "n-way canvas skipping destroyed child");
        }
        live
    })
}

fn color_of(paint: *const sk_paint_t) -> Option<u32> {
    // SAFETY: `paint_ref` checks liveness before dereferencing.
    unsafe { paint_ref(paint) }.map(|p| p.color)
}

// ============================================================================
// Construction
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_new_recording(width: i32, height: i32) -> *mut sk_canvas_t {
    if width < 0 || height < 0 {
        return std::ptr::null_mut();
    }
    heap::alloc(ObjectKind::Canvas, Canvas::new(width, height, Backend::Recording(Vec::new()))) as *mut sk_canvas_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_destroy(canvas: *mut sk_canvas_t) {
    heap::free(canvas as *mut Canvas);
}

#[no_mangle]
pub unsafe extern "C" fn sk_nway_canvas_new(width: i32, height: i32) -> *mut sk_canvas_t {
    if width < 0 || height < 0 {
        return std::ptr::null_mut();
    }
    heap::alloc(ObjectKind::Canvas, Canvas::new(width, height, Backend::NWay(Vec::new()))) as *mut sk_canvas_t
}

unsafe fn nway_children<'a>(canvas: *mut sk_canvas_t, operation: &'static str) -> Option<&'a mut Vec<*mut sk_canvas_t>> {
    if !heap::check_live(canvas as usize, operation) {
        return None;
    }
    match &mut (*(canvas as *mut Canvas)).backend {
        Backend::NWay(children) => Some(children),
        _ => None,
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_nway_canvas_add_canvas(canvas: *mut sk_canvas_t, child: *mut sk_canvas_t) {
    if child.is_null() || child == canvas {
        return;
    }
    if let Some(children) = nway_children(canvas, "nway_canvas_add_canvas") {
        children.push(child);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_nway_canvas_remove_canvas(canvas: *mut sk_canvas_t, child: *mut sk_canvas_t) {
    if let Some(children) = nway_children(canvas, "nway_canvas_remove_canvas") {
        if let Some(index) = children.iter().position(|c| *c == child) {
            children.remove(index);
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_nway_canvas_remove_all(canvas: *mut sk_canvas_t) {
    if let Some(children) = nway_children(canvas, "nway_canvas_remove_all") {
        children.clear();
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedcallbackcanvas_set_procs(procs: sk_managedcallbackcanvas_procs_t) {
    *CALLBACK_PROCS.write().unwrap_or_else(PoisonError::into_inner) = Some(procs);
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedcallbackcanvas_new(context: *mut c_void, width: i32, height: i32) -> *mut sk_canvas_t {
    if width < 0 || height < 0 {
        return std::ptr::null_mut();
    }
    heap::alloc(ObjectKind::Canvas, Canvas::new(width, height, Backend::Callback(context))) as *mut sk_canvas_t
}

#[no_mangle]
pub unsafe extern "C" fn sk_managedcallbackcanvas_delete(canvas: *mut sk_canvas_t) {
    sk_canvas_destroy(canvas);
}

// ============================================================================
// State
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_get_save_count(canvas: *mut sk_canvas_t) -> i32 {
    if !heap::check_live(canvas as usize, "canvas_get_save_count") {
        return 0;
    }
    (*(canvas as *const Canvas)).save_count()
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_get_total_matrix(canvas: *mut sk_canvas_t, matrix: *mut sk_matrix_t) {
    if matrix.is_null() || !heap::check_live(canvas as usize, "canvas_get_total_matrix") {
        return;
    }
    *matrix = (*(canvas as *const Canvas)).matrix;
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_get_device_clip_bounds(canvas: *mut sk_canvas_t, bounds: *mut sk_rect_t) {
    if bounds.is_null() || !heap::check_live(canvas as usize, "canvas_get_device_clip_bounds") {
        return;
    }
    let canvas = &*(canvas as *const Canvas);
    *bounds = sk_rect_t {
        left: 0.0,
        top: 0.0,
        right: canvas.width as f32,
        bottom: canvas.height as f32,
    };
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_save(canvas: *mut sk_canvas_t) -> i32 {
    let mut count = 0;
    let route = route(canvas, "canvas_save", DrawOp::Save, |c| {
        count = c.save_count();
        c.save_stack.push(c.matrix);
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| {
            sk_canvas_save(child);
        }),
        Some(Route::Callback(context, procs)) => {
            if let Some(save) = procs.save {
                save(canvas, context);
            }
        }
        _ => {}
    }
    count
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_save_layer(
    canvas: *mut sk_canvas_t,
    bounds: *const sk_rect_t,
    paint: *const sk_paint_t,
) -> i32 {
    let mut count = 0;
    let op = DrawOp::SaveLayer {
        bounds: bounds.as_ref().copied(),
    };
    let route = route(canvas, "canvas_save_layer", op, |c| {
        count = c.save_count();
        c.save_stack.push(c.matrix);
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| {
            sk_canvas_save_layer(child, bounds, paint);
        }),
        Some(Route::Callback(context, procs)) => {
            if let Some(save_layer) = procs.save_layer {
                save_layer(canvas, context, bounds, paint);
            }
        }
        _ => {}
    }
    count
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_restore(canvas: *mut sk_canvas_t) {
    if sk_canvas_get_save_count(canvas) <= 1 {
        return;
    }
    let route = route(canvas, "canvas_restore", DrawOp::Restore, |c| {
        if let Some(matrix) = c.save_stack.pop() {
            c.matrix = matrix;
        }
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_restore(child)),
        Some(Route::Callback(context, procs)) => {
            if let Some(restore) = procs.restore {
                restore(canvas, context);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_restore_to_count(canvas: *mut sk_canvas_t, save_count: i32) {
    let target = save_count.max(1);
    while sk_canvas_get_save_count(canvas) > target {
        sk_canvas_restore(canvas);
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_translate(canvas: *mut sk_canvas_t, dx: f32, dy: f32) {
    let route = route(canvas, "canvas_translate", DrawOp::Translate { dx, dy }, |c| {
        c.matrix = matrix::concat(&c.matrix, &matrix::translate(dx, dy));
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_translate(child, dx, dy)),
        Some(Route::Callback(context, procs)) => {
            if let Some(translate) = procs.translate {
                translate(canvas, context, dx, dy);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_scale(canvas: *mut sk_canvas_t, sx: f32, sy: f32) {
    let route = route(canvas, "canvas_scale", DrawOp::Scale { sx, sy }, |c| {
        c.matrix = matrix::concat(&c.matrix, &matrix::scale(sx, sy));
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_scale(child, sx, sy)),
        Some(Route::Callback(context, procs)) => {
            if let Some(scale) = procs.scale {
                scale(canvas, context, sx, sy);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_concat(canvas: *mut sk_canvas_t, m: *const sk_matrix_t) {
    let Some(m) = m.as_ref() else { return };
    let route = route(canvas, "canvas_concat", DrawOp::Concat(*m), |c| {
        c.matrix = matrix::concat(&c.matrix, m);
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_concat(child, m)),
        Some(Route::Callback(context, procs)) => {
            if let Some(concat) = procs.concat {
                concat(canvas, context, m);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_set_matrix(canvas: *mut sk_canvas_t, m: *const sk_matrix_t) {
    let Some(m) = m.as_ref() else { return };
    let route = route(canvas, "canvas_set_matrix", DrawOp::SetMatrix(*m), |c| {
        c.matrix = *m;
    });
    match route {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_set_matrix(child, m)),
        Some(Route::Callback(context, procs)) => {
            if let Some(set_matrix) = procs.set_matrix {
                set_matrix(canvas, context, m);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_reset_matrix(canvas: *mut sk_canvas_t) {
    sk_canvas_set_matrix(canvas, &sk_matrix_t::IDENTITY);
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_clip_rect_with_operation(
    canvas: *mut sk_canvas_t,
    rect: *const sk_rect_t,
    op: sk_clipop_t,
    anti_alias: bool,
) {
    let Some(r) = rect.as_ref() else { return };
    let record = DrawOp::ClipRect {
        rect: *r,
        op,
        anti_alias,
    };
    match route(canvas, "canvas_clip_rect", record, |_| {}) {
        Some(Route::Forward(children)) => {
            live_children(children).for_each(|child| sk_canvas_clip_rect_with_operation(child, rect, op, anti_alias))
        }
        Some(Route::Callback(context, procs)) => {
            if let Some(clip_rect) = procs.clip_rect {
                clip_rect(canvas, context, rect, op, anti_alias);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_flush(canvas: *mut sk_canvas_t) {
    match route(canvas, "canvas_flush", DrawOp::Flush, |_| {}) {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_flush(child)),
        Some(Route::Callback(context, procs)) => {
            if let Some(flush) = procs.flush {
                flush(canvas, context);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Drawing
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_draw_paint(canvas: *mut sk_canvas_t, paint: *const sk_paint_t) {
    let Some(color) = color_of(paint) else { return };
    match route(canvas, "canvas_draw_paint", DrawOp::DrawPaint { color }, |_| {}) {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_draw_paint(child, paint)),
        Some(Route::Callback(context, procs)) => {
            if let Some(draw_paint) = procs.draw_paint {
                draw_paint(canvas, context, paint);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_draw_rect(canvas: *mut sk_canvas_t, rect: *const sk_rect_t, paint: *const sk_paint_t) {
    let (Some(r), Some(color)) = (rect.as_ref(), color_of(paint)) else {
        return;
    };
    match route(canvas, "canvas_draw_rect", DrawOp::DrawRect { rect: *r, color }, |_| {}) {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_draw_rect(child, rect, paint)),
        Some(Route::Callback(context, procs)) => {
            if let Some(draw_rect) = procs.draw_rect {
                draw_rect(canvas, context, rect, paint);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_draw_oval(canvas: *mut sk_canvas_t, rect: *const sk_rect_t, paint: *const sk_paint_t) {
    let (Some(r), Some(color)) = (rect.as_ref(), color_of(paint)) else {
        return;
    };
    match route(canvas, "canvas_draw_oval", DrawOp::DrawOval { rect: *r, color }, |_| {}) {
        Some(Route::Forward(children)) => live_children(children).for_each(|child| sk_canvas_draw_oval(child, rect, paint)),
        Some(Route::Callback(context, procs)) => {
            if let Some(draw_oval) = procs.draw_oval {
                draw_oval(canvas, context, rect, paint);
            }
        }
        _ => {}
    }
}

#[no_mangle]
pub unsafe extern "C" fn sk_canvas_draw_vertices(
    canvas: *mut sk_canvas_t,
    vertices: *const sk_vertices_t,
    mode: sk_blendmode_t,
    paint: *const sk_paint_t,
) {
    let Some(color) = color_of(paint) else { return };
    if !heap::check_live(vertices as usize, "canvas_draw_vertices") {
        return;
    }
    let vertex_count = (*(vertices as *const Vertices)).positions.len();
    let record = DrawOp::DrawVertices {
        vertex_count,
        mode,
        color,
    };
    match route(canvas, "canvas_draw_vertices", record, |_| {}) {
        Some(Route::Forward(children)) => {
            live_children(children).for_each(|child| sk_canvas_draw_vertices(child, vertices, mode, paint))
        }
        Some(Route::Callback(context, procs)) => {
            if let Some(draw_vertices) = procs.draw_vertices {
                draw_vertices(canvas, context, vertices, mode, paint);
            }
        }
        _ => {}
    }
}
