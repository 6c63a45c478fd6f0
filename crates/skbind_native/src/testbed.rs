//! Fixed draw sequences used to exercise canvas implementations.

use crate::canvas::*;
use crate::matrix;
use crate::paint::{sk_paint_delete, sk_paint_new, sk_paint_set_antialias, sk_paint_set_color};
use crate::types::{sk_canvas_t, sk_clipop_t, sk_point_t, sk_rect_t, sk_vertices_vertex_mode_t};
use crate::vertices::{sk_vertices_make_copy, sk_vertices_unref};

/// Number of sequences [`sk_testbed`] knows about.
pub const TESTBED_SEQUENCE_COUNT: i32 = 3;

/// Replays sequence `test_number` onto `canvas`. Returns `false` for unknown
/// sequence numbers without touching the canvas.
#[no_mangle]
pub unsafe extern "C" fn sk_testbed(canvas: *mut sk_canvas_t, test_number: i32) -> bool {
    if !(0..TESTBED_SEQUENCE_COUNT).contains(&test_number) {
        return false;
    }
    let paint = sk_paint_new();
    sk_paint_set_antialias(paint, true);
    match test_number {
        0 => {
            sk_paint_set_color(paint, 0xFFFF_0000);
            sk_canvas_save(canvas);
            sk_canvas_translate(canvas, 10.0, 10.0);
            let rect = sk_rect_t {
                left: 0.0,
                top: 0.0,
                right: 100.0,
                bottom: 100.0,
            };
            sk_canvas_draw_rect(canvas, &rect, paint);
            sk_canvas_restore(canvas);
        }
        1 => {
            sk_paint_set_color(paint, 0xFF00_FF00);
            sk_canvas_save_layer(canvas, std::ptr::null(), std::ptr::null());
            sk_canvas_scale(canvas, 2.0, 2.0);
            let clip = sk_rect_t {
                left: 0.0,
                top: 0.0,
                right: 50.0,
                bottom: 50.0,
            };
            sk_canvas_clip_rect_with_operation(canvas, &clip, sk_clipop_t::Intersect, true);
            sk_canvas_draw_oval(canvas, &clip, paint);
            sk_canvas_restore(canvas);
            sk_canvas_flush(canvas);
        }
        _ => {
            sk_paint_set_color(paint, 0xFF00_00FF);
            sk_canvas_draw_paint(canvas, paint);
            sk_canvas_concat(canvas, &matrix::scale(0.5, 0.5));
            let positions = [
                sk_point_t { x: 0.0, y: 0.0 },
                sk_point_t { x: 100.0, y: 0.0 },
                sk_point_t { x: 50.0, y: 100.0 },
            ];
            let vertices = sk_vertices_make_copy(
                sk_vertices_vertex_mode_t::Triangles,
                positions.len() as i32,
                positions.as_ptr(),
                std::ptr::null(),
                std::ptr::null(),
                0,
                std::ptr::null(),
            );
            sk_canvas_draw_vertices(canvas, vertices, 3, paint);
            sk_vertices_unref(vertices);
        }
    }
    sk_paint_delete(paint);
    true
}
