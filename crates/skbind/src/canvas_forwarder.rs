//! Forwarding callback canvases to another canvas

use crate::callback_canvas::{CallbackCanvas, CanvasCallbacks};
use crate::canvas::{Canvas, CanvasOps};
use crate::paint::Paint;
use crate::types::{BlendMode, ClipOp, Matrix, Rect};
use crate::vertices::Vertices;
use skbind_core::{Error, NativeWrapper, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Target {
    canvas: Option<Canvas>,
    owns: bool,
}

/// Forwards every call to an inner [`Canvas`].
///
/// With ownership, the inner canvas is disposed together with the callback
/// canvas the forwarder is installed in.
#[derive(Default)]
pub struct CanvasForwarder {
    target: Mutex<Target>,
}

impl CanvasForwarder {
    pub fn new(canvas: Canvas, owns_canvas: bool) -> Self {
        Self {
            target: Mutex::new(Target {
                canvas: Some(canvas),
                owns: owns_canvas,
            }),
        }
    }

    /// A callback canvas of the given size driven by this forwarder.
    pub fn into_canvas(self, width: i32, height: i32) -> Result<CallbackCanvas<Self>> {
        CallbackCanvas::new(self, width, height)
    }

    fn target(&self) -> MutexGuard<'_, Target> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `canvas`. Fails while another canvas is installed.
    pub fn set_native_object(&self, canvas: Canvas, owns_canvas: bool) -> Result<()> {
        let mut target = self.target();
        if target.canvas.is_some() {
            return Err(Error::InvalidOperation(
                "a canvas has already been assigned, release it first".into(),
            ));
        }
        target.canvas = Some(canvas);
        target.owns = owns_canvas;
        Ok(())
    }

    pub fn native_object(&self) -> Option<Canvas> {
        self.target().canvas.clone()
    }

    pub fn owns_native_object(&self) -> bool {
        self.target().owns
    }

    /// Uninstalls the inner canvas and hands it back without disposing it.
    pub fn release_native_object(&self) -> Option<Canvas> {
        let mut target = self.target();
        target.owns = false;
        target.canvas.take()
    }

    /// Runs `f` on the inner canvas outside the lock. Calls without a canvas
    /// are dropped.
    fn forward(&self, call: &'static str, f: impl FnOnce(&Canvas) -> Result<()>) {
        let Some(canvas) = self.native_object() else {
            tracing::trace!(target: "skbind::canvas", call, "forwarder has no canvas");
            return;
        };
        if let Err(err) = f(&canvas) {
            tracing::debug!(target: "skbind::canvas", call, %err, "forwarded call failed");
        }
    }
}

impl CanvasCallbacks for CanvasForwarder {
    fn save(&self) {
        self.forward("save", |c| c.save().map(drop));
    }

    fn save_layer(&self, bounds: Option<Rect>, paint: Option<&Paint>) {
        self.forward("save_layer", |c| c.save_layer(bounds, paint).map(drop));
    }

    fn restore(&self) {
        self.forward("restore", |c| c.restore());
    }

    fn translate(&self, dx: f32, dy: f32) {
        self.forward("translate", |c| c.translate(dx, dy));
    }

    fn scale(&self, sx: f32, sy: f32) {
        self.forward("scale", |c| c.scale(sx, sy));
    }

    fn concat(&self, matrix: &Matrix) {
        self.forward("concat", |c| c.concat(matrix));
    }

    fn set_matrix(&self, matrix: &Matrix) {
        self.forward("set_matrix", |c| c.set_matrix(matrix));
    }

    fn clip_rect(&self, rect: Rect, op: ClipOp, anti_alias: bool) {
        self.forward("clip_rect", |c| c.clip_rect(rect, op, anti_alias));
    }

    fn draw_paint(&self, paint: &Paint) {
        self.forward("draw_paint", |c| c.draw_paint(paint));
    }

    fn draw_rect(&self, rect: Rect, paint: &Paint) {
        self.forward("draw_rect", |c| c.draw_rect(rect, paint));
    }

    fn draw_oval(&self, rect: Rect, paint: &Paint) {
        self.forward("draw_oval", |c| c.draw_oval(rect, paint));
    }

    fn draw_vertices(&self, vertices: &Vertices, mode: BlendMode, paint: &Paint) {
        self.forward("draw_vertices", |c| c.draw_vertices(vertices, mode, paint));
    }

    fn flush(&self) {
        self.forward("flush", |c| c.flush());
    }

    fn on_dispose(&self) {
        let Target { canvas, owns } = std::mem::take(&mut *self.target());
        if let (Some(canvas), true) = (canvas, owns) {
            canvas.dispose();
        }
    }
}
