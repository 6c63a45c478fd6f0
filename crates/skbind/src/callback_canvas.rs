//! Canvases implemented in Rust
//!
//! A [`CallbackCanvas`] is a native canvas that forwards every call to a
//! [`CanvasCallbacks`] implementation. Native code reaches the instance
//! through an opaque context token, never through a pointer to the proxy.
//!
//! The native canvas calls its destroy proc from its destructor, whoever
//! destroys it. When that happens first, the proxy is disposed without
//! deleting the native canvas a second time.

use crate::canvas::CanvasOps;
use crate::paint::Paint;
use crate::types::{BlendMode, ClipOp, Matrix, Rect};
use crate::vertices::{Vertices, VerticesNative};
use skbind_core::{
    dispatch, dispatch_destroy, Borrowed, BridgeTarget, BridgedKind, ContextTable, Handle, NativeBridge, NativeKind,
    NativeWrapper, ProcTable, Proxy, Result,
};
use skbind_native::{
    sk_blendmode_t, sk_canvas_t, sk_clipop_t, sk_managedcallbackcanvas_delete, sk_managedcallbackcanvas_new,
    sk_managedcallbackcanvas_procs_t, sk_managedcallbackcanvas_set_procs, sk_matrix_t, sk_paint_t, sk_rect_t,
    sk_vertices_t,
};
use std::ffi::c_void;
use std::fmt;
use std::sync::{Arc, Weak};

/// Hooks invoked for each call a [`CallbackCanvas`] receives.
///
/// Every hook defaults to doing nothing. Paints and vertices are only valid
/// for the duration of the call.
#[allow(unused_variables)]
pub trait CanvasCallbacks: Send + Sync + 'static {
    fn save(&self) {}
    fn save_layer(&self, bounds: Option<Rect>, paint: Option<&Paint>) {}
    fn restore(&self) {}
    fn translate(&self, dx: f32, dy: f32) {}
    fn scale(&self, sx: f32, sy: f32) {}
    fn concat(&self, matrix: &Matrix) {}
    fn set_matrix(&self, matrix: &Matrix) {}
    fn clip_rect(&self, rect: Rect, op: ClipOp, anti_alias: bool) {}
    fn draw_paint(&self, paint: &Paint) {}
    fn draw_rect(&self, rect: Rect, paint: &Paint) {}
    fn draw_oval(&self, rect: Rect, paint: &Paint) {}
    fn draw_vertices(&self, vertices: &Vertices, mode: BlendMode, paint: &Paint) {}
    fn flush(&self) {}

    /// Called once when the canvas is disposed explicitly or destroyed by
    /// native code.
    fn on_dispose(&self) {}
}

pub struct CallbackCanvasNative<C: CanvasCallbacks> {
    bridge: NativeBridge,
    callbacks: C,
}

impl<C: CanvasCallbacks> NativeKind for CallbackCanvasNative<C> {
    const TYPE_NAME: &'static str = "CallbackCanvas";

    fn dispose_native(&self, handle: Handle) {
        if !self.bridge.destroyed_natively() {
            // SAFETY: the canvas is deleted exactly once; its destroy proc
            // finds this proxy already disposing.
            unsafe { sk_managedcallbackcanvas_delete(handle.as_ptr()) }
        }
    }

    fn dispose_managed(&self) {
        self.callbacks.on_dispose();
    }
}

impl<C: CanvasCallbacks> BridgedKind for CallbackCanvasNative<C> {
    fn bridge(&self) -> &NativeBridge {
        &self.bridge
    }
}

/// What the trampolines need from a callback canvas, whatever its hooks.
trait CanvasCallbackTarget: BridgeTarget {
    fn callbacks(&self) -> &dyn CanvasCallbacks;
}

impl<C: CanvasCallbacks> CanvasCallbackTarget for Proxy<CallbackCanvasNative<C>> {
    fn callbacks(&self) -> &dyn CanvasCallbacks {
        &self.kind().callbacks
    }
}

static CANVASES: ContextTable<dyn CanvasCallbackTarget> = ContextTable::new();
static CANVAS_PROCS: ProcTable = ProcTable::new();

/// A canvas whose calls go to `C`.
pub struct CallbackCanvas<C: CanvasCallbacks>(Arc<Proxy<CallbackCanvasNative<C>>>);

impl<C: CanvasCallbacks> CallbackCanvas<C> {
    pub fn new(callbacks: C, width: i32, height: i32) -> Result<Self> {
        CANVAS_PROCS.ensure("CallbackCanvas", register_procs);
        let proxy = Proxy::new_cyclic(true, |weak| {
            let target: Weak<dyn CanvasCallbackTarget> = weak.clone();
            CallbackCanvasNative {
                bridge: NativeBridge::new(CANVASES.create(target)),
                callbacks,
            }
        });
        let token = proxy.kind().bridge.token();
        // SAFETY: the context is an opaque token, resolved only through the table.
        let handle = Handle::from_mut_ptr(unsafe { sk_managedcallbackcanvas_new(token.as_ptr(), width, height) });
        if let Err(err) = proxy.assign_handle(handle) {
            CANVASES.release(token);
            return Err(err);
        }
        Ok(Self(proxy))
    }

    pub fn callbacks(&self) -> &C {
        &self.0.kind().callbacks
    }

    /// Whether native code destroyed the canvas before it was disposed here.
    pub fn destroyed_natively(&self) -> bool {
        self.0.kind().bridge.destroyed_natively()
    }
}

impl<C: CanvasCallbacks> Clone for CallbackCanvas<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C: CanvasCallbacks> NativeWrapper for CallbackCanvas<C> {
    type Kind = CallbackCanvasNative<C>;

    fn from_proxy(proxy: Arc<Proxy<CallbackCanvasNative<C>>>) -> Self {
        Self(proxy)
    }

    fn proxy(&self) -> &Arc<Proxy<CallbackCanvasNative<C>>> {
        &self.0
    }
}

impl<C: CanvasCallbacks> CanvasOps for CallbackCanvas<C> {}

impl<C: CanvasCallbacks> fmt::Debug for CallbackCanvas<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackCanvas").field(&self.0).finish()
    }
}

// =============================================================================
// Trampolines
// =============================================================================

fn register_procs() {
    let procs = sk_managedcallbackcanvas_procs_t {
        save: Some(save_proc),
        save_layer: Some(save_layer_proc),
        restore: Some(restore_proc),
        translate: Some(translate_proc),
        scale: Some(scale_proc),
        concat: Some(concat_proc),
        set_matrix: Some(set_matrix_proc),
        clip_rect: Some(clip_rect_proc),
        draw_paint: Some(draw_paint_proc),
        draw_rect: Some(draw_rect_proc),
        draw_oval: Some(draw_oval_proc),
        draw_vertices: Some(draw_vertices_proc),
        flush: Some(flush_proc),
        destroy: Some(destroy_proc),
    };
    // SAFETY: the procs are plain functions that live for the whole program.
    unsafe { sk_managedcallbackcanvas_set_procs(procs) };
}

fn with_callbacks(context: *mut c_void, callback: &'static str, f: impl FnOnce(&dyn CanvasCallbacks)) {
    dispatch(&CANVASES, context, callback, |target| f(target.callbacks()));
}

/// Runs `f` with a paint borrowed for the call. A paint that cannot be
/// wrapped drops the call.
fn with_paint(paint: *const sk_paint_t, callback: &'static str, f: impl FnOnce(&Paint)) {
    match Paint::borrowed(Handle::from_ptr(paint)) {
        Ok(Some(paint)) => f(&paint),
        Ok(None) => tracing::debug!(target: "skbind::bridge", callback, "call without a paint dropped"),
        Err(err) => tracing::warn!(target: "skbind::bridge", callback, %err, "paint could not be borrowed"),
    }
}

/// Reads an optional rectangle argument.
unsafe fn rect_arg(rect: *const sk_rect_t) -> Option<Rect> {
    rect.as_ref().map(|r| Rect::from(*r))
}

unsafe fn matrix_arg(matrix: *const sk_matrix_t) -> Option<Matrix> {
    matrix.as_ref().map(|m| Matrix::from(*m))
}

unsafe extern "C" fn save_proc(_canvas: *mut sk_canvas_t, context: *mut c_void) {
    with_callbacks(context, "save", |c| c.save());
}

unsafe extern "C" fn save_layer_proc(
    _canvas: *mut sk_canvas_t,
    context: *mut c_void,
    bounds: *const sk_rect_t,
    paint: *const sk_paint_t,
) {
    let bounds = rect_arg(bounds);
    with_callbacks(context, "save_layer", |c| {
        if paint.is_null() {
            c.save_layer(bounds, None);
        } else {
            with_paint(paint, "save_layer", |paint| c.save_layer(bounds, Some(paint)));
        }
    });
}

unsafe extern "C" fn restore_proc(_canvas: *mut sk_canvas_t, context: *mut c_void) {
    with_callbacks(context, "restore", |c| c.restore());
}

unsafe extern "C" fn translate_proc(_canvas: *mut sk_canvas_t, context: *mut c_void, dx: f32, dy: f32) {
    with_callbacks(context, "translate", |c| c.translate(dx, dy));
}

unsafe extern "C" fn scale_proc(_canvas: *mut sk_canvas_t, context: *mut c_void, sx: f32, sy: f32) {
    with_callbacks(context, "scale", |c| c.scale(sx, sy));
}

unsafe extern "C" fn concat_proc(_canvas: *mut sk_canvas_t, context: *mut c_void, matrix: *const sk_matrix_t) {
    if let Some(matrix) = matrix_arg(matrix) {
        with_callbacks(context, "concat", |c| c.concat(&matrix));
    }
}

unsafe extern "C" fn set_matrix_proc(_canvas: *mut sk_canvas_t, context: *mut c_void, matrix: *const sk_matrix_t) {
    if let Some(matrix) = matrix_arg(matrix) {
        with_callbacks(context, "set_matrix", |c| c.set_matrix(&matrix));
    }
}

unsafe extern "C" fn clip_rect_proc(
    _canvas: *mut sk_canvas_t,
    context: *mut c_void,
    rect: *const sk_rect_t,
    op: sk_clipop_t,
    anti_alias: bool,
) {
    if let Some(rect) = rect_arg(rect) {
        with_callbacks(context, "clip_rect", |c| c.clip_rect(rect, op.into(), anti_alias));
    }
}

unsafe extern "C" fn draw_paint_proc(_canvas: *mut sk_canvas_t, context: *mut c_void, paint: *const sk_paint_t) {
    with_callbacks(context, "draw_paint", |c| {
        with_paint(paint, "draw_paint", |paint| c.draw_paint(paint));
    });
}

unsafe extern "C" fn draw_rect_proc(
    _canvas: *mut sk_canvas_t,
    context: *mut c_void,
    rect: *const sk_rect_t,
    paint: *const sk_paint_t,
) {
    let Some(rect) = rect_arg(rect) else { return };
    with_callbacks(context, "draw_rect", |c| {
        with_paint(paint, "draw_rect", |paint| c.draw_rect(rect, paint));
    });
}

unsafe extern "C" fn draw_oval_proc(
    _canvas: *mut sk_canvas_t,
    context: *mut c_void,
    rect: *const sk_rect_t,
    paint: *const sk_paint_t,
) {
    let Some(rect) = rect_arg(rect) else { return };
    with_callbacks(context, "draw_oval", |c| {
        with_paint(paint, "draw_oval", |paint| c.draw_oval(rect, paint));
    });
}

unsafe extern "C" fn draw_vertices_proc(
    _canvas: *mut sk_canvas_t,
    context: *mut c_void,
    vertices: *const sk_vertices_t,
    mode: sk_blendmode_t,
    paint: *const sk_paint_t,
) {
    let Some(mode) = BlendMode::from_native(mode) else {
        tracing::warn!(target: "skbind::bridge", mode, "draw_vertices with an unknown blend mode dropped");
        return;
    };
    with_callbacks(context, "draw_vertices", |c| {
        let vertices = match Borrowed::<Vertices>::from_native(Handle::from_ptr(vertices), |_, _| Ok(VerticesNative)) {
            Ok(Some(vertices)) => vertices,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(target: "skbind::bridge", %err, "vertices could not be borrowed");
                return;
            }
        };
        with_paint(paint, "draw_vertices", |paint| c.draw_vertices(&vertices, mode, paint));
    });
}

unsafe extern "C" fn flush_proc(_canvas: *mut sk_canvas_t, context: *mut c_void) {
    with_callbacks(context, "flush", |c| c.flush());
}

unsafe extern "C" fn destroy_proc(_canvas: *mut sk_canvas_t, context: *mut c_void) {
    dispatch_destroy(&CANVASES, context);
}
