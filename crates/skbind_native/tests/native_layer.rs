//! Integration tests for the native layer's ownership rules
//!
//! These drive the C-ABI entry points directly, the way the bindings do.

use skbind_native::*;
use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicUsize, Ordering};

fn id_of<T>(ptr: *mut T) -> u64 {
    debug::object_id(ptr as usize).expect("live object")
}

#[test]
fn test_ledger_counts_destroys_and_double_frees() {
    unsafe {
        let paint = sk_paint_new();
        let id = id_of(paint);
        assert!(debug::is_live(paint as usize));

        sk_paint_delete(paint);
        assert_eq!(debug::destroy_count(id), 1);
        assert!(!debug::is_live(paint as usize));

        let before = debug::double_free_count();
        sk_paint_delete(paint);
        assert_eq!(debug::destroy_count(id), 1);
        assert!(debug::double_free_count() > before);
    }
}

#[test]
fn test_null_pointers_are_ignored() {
    unsafe {
        sk_paint_delete(std::ptr::null_mut());
        sk_refcnt_safe_unref(std::ptr::null_mut());
        sk_canvas_draw_paint(std::ptr::null_mut(), std::ptr::null());
        assert_eq!(sk_canvas_get_save_count(std::ptr::null_mut()), 0);
        assert!(sk_canvas_new_recording(-1, 1).is_null());
    }
}

#[test]
fn test_paint_holds_a_shader_reference() {
    unsafe {
        let shader = sk_shader_new_color(0xFF00_00FF);
        let id = id_of(shader);
        let paint = sk_paint_new();
        assert_eq!(sk_refcnt_get_ref_count(shader as *const sk_refcnt_t), 1);

        sk_paint_set_shader(paint, shader);
        assert_eq!(sk_refcnt_get_ref_count(shader as *const sk_refcnt_t), 2);

        // The getter hands out a new reference.
        let fetched = sk_paint_get_shader(paint);
        assert_eq!(fetched, shader);
        assert_eq!(sk_refcnt_get_ref_count(shader as *const sk_refcnt_t), 3);
        sk_shader_unref(fetched);

        sk_paint_delete(paint);
        assert!(sk_refcnt_unique(shader as *const sk_refcnt_t));
        sk_shader_unref(shader);
        assert_eq!(debug::destroy_count(id), 1);
    }
}

#[test]
fn test_mode_blenders_are_shared() {
    unsafe {
        let first = sk_blender_new_mode(3);
        let second = sk_blender_new_mode(3);
        assert_eq!(first, second);
        assert_eq!(sk_refcnt_get_ref_count(first as *const sk_refcnt_t), 3);

        sk_blender_unref(first);
        sk_blender_unref(second);
        assert!(sk_refcnt_unique(first as *const sk_refcnt_t));
        let other = sk_blender_new_mode(4);
        assert_ne!(other, first);
        sk_blender_unref(other);
        assert!(sk_blender_new_mode(LAST_BLEND_MODE + 1).is_null());
        assert!(sk_blender_new_mode(-1).is_null());
    }
}

#[test]
fn test_nway_canvas_routes_to_live_children() {
    unsafe {
        let nway = sk_nway_canvas_new(10, 10);
        let first = sk_canvas_new_recording(10, 10);
        let second = sk_canvas_new_recording(10, 10);
        sk_nway_canvas_add_canvas(nway, first);
        sk_nway_canvas_add_canvas(nway, second);
        sk_nway_canvas_add_canvas(nway, nway);

        sk_canvas_translate(nway, 1.0, 2.0);
        sk_canvas_destroy(second);
        sk_canvas_save(nway);

        assert_eq!(
            debug::recorded_ops(first as usize).unwrap(),
            vec![DrawOp::Translate { dx: 1.0, dy: 2.0 }, DrawOp::Save]
        );
        assert!(debug::recorded_ops(nway as usize).is_none());

        sk_canvas_destroy(nway);
        assert!(debug::is_live(first as usize));
        sk_canvas_destroy(first);
    }
}

// Procs are global per family, so each family is exercised by one test.

static CANVAS_TRANSLATES: AtomicUsize = AtomicUsize::new(0);
static CANVAS_DESTROYS: AtomicUsize = AtomicUsize::new(0);
const CANVAS_CONTEXT: usize = 0x5EED;

unsafe extern "C" fn count_translate(_canvas: *mut sk_canvas_t, context: *mut c_void, dx: f32, _dy: f32) {
    assert_eq!(context as usize, CANVAS_CONTEXT);
    CANVAS_TRANSLATES.fetch_add(dx as usize, Ordering::SeqCst);
}

unsafe extern "C" fn count_canvas_destroy(_canvas: *mut sk_canvas_t, context: *mut c_void) {
    assert_eq!(context as usize, CANVAS_CONTEXT);
    CANVAS_DESTROYS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_callback_canvas_calls_its_procs() {
    unsafe {
        sk_managedcallbackcanvas_set_procs(sk_managedcallbackcanvas_procs_t {
            translate: Some(count_translate),
            destroy: Some(count_canvas_destroy),
            ..Default::default()
        });
        let canvas = sk_managedcallbackcanvas_new(CANVAS_CONTEXT as *mut c_void, 10, 10);

        sk_canvas_translate(canvas, 3.0, 0.0);
        // Calls without a proc only update state.
        sk_canvas_save(canvas);
        assert_eq!(sk_canvas_get_save_count(canvas), 2);
        assert_eq!(CANVAS_TRANSLATES.load(Ordering::SeqCst), 3);

        sk_managedcallbackcanvas_delete(canvas);
        assert_eq!(CANVAS_DESTROYS.load(Ordering::SeqCst), 1);
    }
}

static LISTENER_CHANGES: AtomicUsize = AtomicUsize::new(0);
static LISTENER_DESTROYS: AtomicUsize = AtomicUsize::new(0);
static LIST_DESTROYS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn count_change(_listener: *mut sk_idchangelistener_t, _context: *mut c_void) {
    LISTENER_CHANGES.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn count_listener_destroy(_listener: *mut sk_idchangelistener_t, _context: *mut c_void) {
    LISTENER_DESTROYS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C" fn count_list_destroy(_list: *mut sk_idchangelistenerlist_t, _context: *mut c_void) {
    LIST_DESTROYS.fetch_add(1, Ordering::SeqCst);
}

#[test]
fn test_listener_list_adopts_and_releases_references() {
    unsafe {
        sk_managedidchangelistener_set_procs(sk_idchangelistener_procs_t {
            changed: Some(count_change),
            destroy: Some(count_listener_destroy),
        });
        sk_managedidchangelistenerlist_set_procs(sk_idchangelistenerlist_procs_t {
            destroy: Some(count_list_destroy),
        });
        let list = sk_managedidchangelistenerlist_new(std::ptr::null_mut());
        let fired = sk_managedidchangelistener_new(std::ptr::null_mut());
        let skipped = sk_managedidchangelistener_new(std::ptr::null_mut());
        let (fired_id, skipped_id) = (id_of(fired), id_of(skipped));

        sk_managedidchangelistenerlist_add(list, fired, true);
        sk_managedidchangelistenerlist_add(list, skipped, true);
        sk_managedidchangelistener_mark_should_deregister(skipped);
        assert_eq!(sk_managedidchangelistenerlist_count(list), 2);

        sk_managedidchangelistenerlist_changed(list, true);

        assert_eq!(LISTENER_CHANGES.load(Ordering::SeqCst), 1);
        assert_eq!(LISTENER_DESTROYS.load(Ordering::SeqCst), 2);
        assert_eq!(debug::destroy_count(fired_id), 1);
        assert_eq!(debug::destroy_count(skipped_id), 1);
        assert_eq!(sk_managedidchangelistenerlist_count(list), 0);

        let pending = sk_managedidchangelistener_new(std::ptr::null_mut());
        sk_managedidchangelistenerlist_add(list, pending, false);
        sk_managedidchangelistenerlist_delete(list);
        assert_eq!(LISTENER_CHANGES.load(Ordering::SeqCst), 1);
        assert_eq!(LISTENER_DESTROYS.load(Ordering::SeqCst), 3);
        assert_eq!(LIST_DESTROYS.load(Ordering::SeqCst), 1);
    }
}

unsafe fn sk_str(text: &str) -> *mut sk_string_t {
    sk_string_new_with_copy(text.as_ptr().cast(), text.len())
}

#[test]
fn test_runtime_effect_declarations_and_errors() {
    unsafe {
        let source = sk_str("uniform float3 color; uniform shader input; half4 main(float2 p) { return input.eval(p); }");
        let errors = sk_string_new_empty();
        let effect = sk_runtimeeffect_make_for_shader(source, errors);
        assert!(!effect.is_null());
        assert_eq!(sk_runtimeeffect_get_uniform_byte_size(effect), 12);
        assert_eq!(sk_runtimeeffect_get_uniforms_size(effect), 1);
        assert_eq!(sk_runtimeeffect_get_children_size(effect), 1);

        let color = CStr::from_bytes_with_nul(b"color\0").unwrap();
        let first = sk_runtimeeffect_get_uniform_from_index(effect, 0);
        let by_name = sk_runtimeeffect_get_uniform_from_name(effect, color.as_ptr());
        assert_eq!(first, by_name);
        assert_eq!(CStr::from_ptr(sk_runtimeeffect_uniform_get_name(first)), color);

        let broken = sk_str("uniform float2 a;\nuniform float a; half4 main(float2 p) { return half4(0); }");
        assert!(sk_runtimeeffect_make_for_shader(broken, errors).is_null());
        let message = CStr::from_ptr(sk_string_get_c_str(errors)).to_str().unwrap();
        assert_eq!(message, "error: 2: symbol 'a' was already defined");

        sk_runtimeeffect_unref(effect);
        for string in [source, broken, errors] {
            sk_string_destructor(string);
        }
    }
}

#[test]
fn test_testbed_rejects_unknown_sequences() {
    unsafe {
        let canvas = sk_canvas_new_recording(100, 100);
        for sequence in 0..TESTBED_SEQUENCE_COUNT {
            assert!(sk_testbed(canvas, sequence));
        }
        assert!(!sk_testbed(canvas, TESTBED_SEQUENCE_COUNT));
        assert!(!debug::recorded_ops(canvas as usize).unwrap().is_empty());
        sk_canvas_destroy(canvas);
    }
}
