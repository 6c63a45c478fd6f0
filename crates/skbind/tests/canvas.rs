//! Integration tests for recording and n-way canvases

mod common;

use common::{destroys, init_tracing, object_id};
use skbind::prelude::*;
use skbind::{testbed, DrawOp, Handle};
use skbind_native::{debug, sk_rect_t};

fn red_paint() -> Paint {
    let paint = Paint::new().unwrap();
    paint.set_color(Color::RED).unwrap();
    paint
}

fn native_rect(rect: Rect) -> sk_rect_t {
    rect.into()
}

#[test]
fn test_recording_canvas_records_calls() {
    init_tracing();
    let canvas = Canvas::new(100, 100).unwrap();
    let paint = red_paint();
    let rect = Rect::from_xywh(1.0, 2.0, 3.0, 4.0);

    assert_eq!(canvas.save().unwrap(), 1);
    canvas.translate(5.0, 6.0).unwrap();
    canvas.draw_rect(rect, &paint).unwrap();
    canvas.restore().unwrap();

    assert_eq!(
        canvas.recorded_ops().unwrap(),
        vec![
            DrawOp::Save,
            DrawOp::Translate { dx: 5.0, dy: 6.0 },
            DrawOp::DrawRect {
                rect: native_rect(rect),
                color: Color::RED.0,
            },
            DrawOp::Restore,
        ]
    );
}

#[test]
fn test_canvas_state_queries() {
    init_tracing();
    let canvas = Canvas::new(64, 32).unwrap();
    assert_eq!(canvas.device_clip_bounds().unwrap(), Rect::from_wh(64.0, 32.0));
    assert!(canvas.total_matrix().unwrap().is_identity());

    canvas.translate(10.0, 0.0).unwrap();
    canvas.scale(2.0, 2.0).unwrap();
    let matrix = canvas.total_matrix().unwrap();
    assert_eq!(matrix, Matrix::translate(10.0, 0.0).concat(&Matrix::scale(2.0, 2.0)));

    canvas.reset_matrix().unwrap();
    assert!(canvas.total_matrix().unwrap().is_identity());
}

#[test]
fn test_auto_restore_returns_to_saved_count() {
    init_tracing();
    let canvas = Canvas::new(10, 10).unwrap();
    {
        let _restore = AutoCanvasRestore::new(&canvas, true).unwrap();
        canvas.save().unwrap();
        assert_eq!(canvas.save_count().unwrap(), 3);
    }
    assert_eq!(canvas.save_count().unwrap(), 1);

    let mut restore = AutoCanvasRestore::new(&canvas, false).unwrap();
    canvas.save().unwrap();
    restore.restore();
    assert_eq!(canvas.save_count().unwrap(), 1);
}

#[test]
fn test_invalid_sizes_fail_before_native_code() {
    init_tracing();
    assert!(matches!(Canvas::new(-1, 10), Err(Error::InvalidArgument { name: "size", .. })));
    assert!(matches!(NWayCanvas::new(10, -1), Err(Error::InvalidArgument { .. })));
}

#[test]
fn test_from_native_reuses_the_canvas_wrapper() {
    init_tracing();
    let canvas = Canvas::new(10, 10).unwrap();
    let same = Canvas::from_native(canvas.handle(), false, false).unwrap().unwrap();
    assert!(same.same_object(&canvas));
    assert!(Canvas::from_native(Handle::NULL, false, false).unwrap().is_none());
}

#[test]
fn test_null_canvas_draws_nothing() {
    init_tracing();
    let canvas = Canvas::null().unwrap();
    canvas.draw_paint(&red_paint()).unwrap();
    assert!(matches!(canvas.recorded_ops(), Err(Error::InvalidOperation(_))));
}

#[test]
fn test_nway_canvas_keeps_targets_alive() {
    init_tracing();
    let nway = NWayCanvas::new(50, 50).unwrap();
    let target = Canvas::new(50, 50).unwrap();
    let target_handle = target.handle();
    let target_id = object_id(target_handle);

    nway.add_canvas(&target).unwrap();
    drop(target);

    // Only the n-way canvas holds the target now, and calls still reach it.
    assert_eq!(nway.canvas_count(), 1);
    nway.draw_paint(&red_paint()).unwrap();
    assert_eq!(
        debug::recorded_ops(target_handle.raw()).unwrap(),
        vec![DrawOp::DrawPaint { color: Color::RED.0 }]
    );

    let target = Canvas::from_native(target_handle, false, false).unwrap().unwrap();
    nway.remove_canvas(&target).unwrap();
    assert_eq!(nway.canvas_count(), 0);
    drop(target);
    assert_eq!(destroys(target_id), 1);
}

#[test]
fn test_nway_remove_all_releases_targets() {
    init_tracing();
    let nway = NWayCanvas::new(20, 20).unwrap();
    let first = Canvas::new(20, 20).unwrap();
    let second = Canvas::new(20, 20).unwrap();
    nway.add_canvas(&first).unwrap();
    nway.add_canvas(&second).unwrap();
    let ids = [object_id(first.handle()), object_id(second.handle())];
    drop((first, second));

    nway.remove_all().unwrap();

    assert_eq!(nway.canvas_count(), 0);
    assert!(ids.iter().all(|&id| destroys(id) == 1));
}

#[test]
fn test_disposing_nway_keeps_shared_targets() {
    init_tracing();
    let nway = NWayCanvas::new(20, 20).unwrap();
    let target = Canvas::new(20, 20).unwrap();
    let id = object_id(target.handle());
    nway.add_canvas(&target).unwrap();

    nway.dispose();

    assert_eq!(destroys(id), 0);
    target.draw_paint(&red_paint()).unwrap();
    assert_eq!(target.recorded_ops().unwrap().len(), 1);
}

#[test]
fn test_draw_vertices_reaches_the_canvas() {
    init_tracing();
    let canvas = Canvas::new(10, 10).unwrap();
    let positions = [Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)];
    let vertices = Vertices::copy(VertexMode::Triangles, &positions, None, None, None).unwrap();

    canvas.draw_vertices(&vertices, BlendMode::Modulate, &red_paint()).unwrap();

    assert_eq!(
        canvas.recorded_ops().unwrap(),
        vec![DrawOp::DrawVertices {
            vertex_count: 3,
            mode: BlendMode::Modulate.to_native(),
            color: Color::RED.0,
        }]
    );
}

#[test]
fn test_testbed_sequences() {
    init_tracing();
    let canvas = Canvas::new(200, 200).unwrap();
    assert!(testbed(&canvas, 0).unwrap());
    let ops = canvas.recorded_ops().unwrap();
    assert_eq!(ops.first(), Some(&DrawOp::Save));
    assert_eq!(ops.last(), Some(&DrawOp::Restore));

    let untouched = Canvas::new(10, 10).unwrap();
    assert!(!testbed(&untouched, 7).unwrap());
    assert!(untouched.recorded_ops().unwrap().is_empty());
}

#[test]
fn test_disposed_canvas_refuses_calls() {
    init_tracing();
    let canvas = Canvas::new(10, 10).unwrap();
    let id = object_id(canvas.handle());
    canvas.dispose();
    assert_eq!(destroys(id), 1);
    assert_eq!(canvas.save(), Err(Error::ObjectDisposed("Canvas")));
    assert_eq!(testbed(&canvas, 0), Err(Error::ObjectDisposed("Canvas")));
}
