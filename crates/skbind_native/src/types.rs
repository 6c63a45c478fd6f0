//! C-ABI types shared between the native layer and its callers.
//!
//! Object types are opaque: callers only ever hold pointers to them. Value
//! types are `#[repr(C)]` plain-old-data and can be cast to and from the
//! binding's own value types with `bytemuck`.

use bytemuck::{Pod, Zeroable};
use std::ffi::c_void;

macro_rules! opaque_types {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque_types! {
    /// Any virtually reference-counted object.
    sk_refcnt_t,
    /// Any non-virtually reference-counted object.
    sk_nvrefcnt_t,
    sk_paint_t,
    sk_canvas_t,
    sk_string_t,
    sk_imagefilter_t,
    sk_shader_t,
    sk_blender_t,
    sk_vertices_t,
    sk_runtimeeffect_t,
    sk_runtimeeffect_uniform_t,
    sk_runtimeeffect_child_t,
    sk_runtimeeffectbuilder_t,
    sk_idchangelistener_t,
    sk_idchangelistenerlist_t,
}

/// 32-bit ARGB color.
pub type sk_color_t = u32;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct sk_point_t {
    pub x: f32,
    pub y: f32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct sk_rect_t {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Row-major 3x3 matrix.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct sk_matrix_t {
    pub scale_x: f32,
    pub skew_x: f32,
    pub trans_x: f32,
    pub skew_y: f32,
    pub scale_y: f32,
    pub trans_y: f32,
    pub persp0: f32,
    pub persp1: f32,
    pub persp2: f32,
}

impl sk_matrix_t {
    pub const IDENTITY: sk_matrix_t = sk_matrix_t {
        scale_x: 1.0,
        skew_x: 0.0,
        trans_x: 0.0,
        skew_y: 0.0,
        scale_y: 1.0,
        trans_y: 0.0,
        persp0: 0.0,
        persp1: 0.0,
        persp2: 1.0,
    };
}

impl Default for sk_matrix_t {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_clipop_t {
    Difference = 0,
    Intersect = 1,
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_vertices_vertex_mode_t {
    Triangles = 0,
    TriangleStrip = 1,
    TriangleFan = 2,
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_paint_style_t {
    Fill = 0,
    Stroke = 1,
    StrokeAndFill = 2,
}

/// Porter-Duff and separable blend modes, numbered as in the native library.
pub type sk_blendmode_t = i32;

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_runtimeeffect_uniform_type_t {
    Float = 0,
    Float2 = 1,
    Float3 = 2,
    Float4 = 3,
    Float2x2 = 4,
    Float3x3 = 5,
    Float4x4 = 6,
    Int = 7,
    Int2 = 8,
    Int3 = 9,
    Int4 = 10,
}

impl sk_runtimeeffect_uniform_type_t {
    /// Size in bytes of one value of this type.
    pub fn size_in_bytes(self) -> usize {
        use sk_runtimeeffect_uniform_type_t::*;
        match self {
            Float | Int => 4,
            Float2 | Int2 => 8,
            Float3 | Int3 => 12,
            Float4 | Int4 | Float2x2 => 16,
            Float3x3 => 36,
            Float4x4 => 64,
        }
    }

    pub fn is_integer(self) -> bool {
        use sk_runtimeeffect_uniform_type_t::*;
        matches!(self, Int | Int2 | Int3 | Int4)
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_runtimeeffect_child_type_t {
    Shader = 0,
    ColorFilter = 1,
    Blender = 2,
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum sk_runtimeeffect_kind_t {
    Shader = 0,
    ColorFilter = 1,
    Blender = 2,
}

// ============================================================================
// Managed callback procs
// ============================================================================

pub type sk_canvas_proc = Option<unsafe extern "C" fn(canvas: *mut sk_canvas_t, context: *mut c_void)>;
pub type sk_canvas_save_layer_proc = Option<
    unsafe extern "C" fn(
        canvas: *mut sk_canvas_t,
        context: *mut c_void,
        bounds: *const sk_rect_t,
        paint: *const sk_paint_t,
    ),
>;
pub type sk_canvas_scalar2_proc =
    Option<unsafe extern "C" fn(canvas: *mut sk_canvas_t, context: *mut c_void, a: f32, b: f32)>;
pub type sk_canvas_matrix_proc = Option<
    unsafe extern "C" fn(canvas: *mut sk_canvas_t, context: *mut c_void, matrix: *const sk_matrix_t),
>;
pub type sk_canvas_clip_rect_proc = Option<
    unsafe extern "C" fn(
        canvas: *mut sk_canvas_t,
        context: *mut c_void,
        rect: *const sk_rect_t,
        op: sk_clipop_t,
        anti_alias: bool,
    ),
>;
pub type sk_canvas_draw_paint_proc = Option<
    unsafe extern "C" fn(canvas: *mut sk_canvas_t, context: *mut c_void, paint: *const sk_paint_t),
>;
pub type sk_canvas_draw_rect_proc = Option<
    unsafe extern "C" fn(
        canvas: *mut sk_canvas_t,
        context: *mut c_void,
        rect: *const sk_rect_t,
        paint: *const sk_paint_t,
    ),
>;
pub type sk_canvas_draw_vertices_proc = Option<
    unsafe extern "C" fn(
        canvas: *mut sk_canvas_t,
        context: *mut c_void,
        vertices: *const sk_vertices_t,
        mode: sk_blendmode_t,
        paint: *const sk_paint_t,
    ),
>;

/// Callback table for managed callback canvases.
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct sk_managedcallbackcanvas_procs_t {
    pub save: sk_canvas_proc,
    pub save_layer: sk_canvas_save_layer_proc,
    pub restore: sk_canvas_proc,
    pub translate: sk_canvas_scalar2_proc,
    pub scale: sk_canvas_scalar2_proc,
    pub concat: sk_canvas_matrix_proc,
    pub set_matrix: sk_canvas_matrix_proc,
    pub clip_rect: sk_canvas_clip_rect_proc,
    pub draw_paint: sk_canvas_draw_paint_proc,
    pub draw_rect: sk_canvas_draw_rect_proc,
    pub draw_oval: sk_canvas_draw_rect_proc,
    pub draw_vertices: sk_canvas_draw_vertices_proc,
    pub flush: sk_canvas_proc,
    pub destroy: sk_canvas_proc,
}

pub type sk_idchangelistener_proc =
    Option<unsafe extern "C" fn(listener: *mut sk_idchangelistener_t, context: *mut c_void)>;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct sk_idchangelistener_procs_t {
    pub changed: sk_idchangelistener_proc,
    pub destroy: sk_idchangelistener_proc,
}

pub type sk_idchangelistenerlist_proc =
    Option<unsafe extern "C" fn(list: *mut sk_idchangelistenerlist_t, context: *mut c_void)>;

#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct sk_idchangelistenerlist_procs_t {
    pub destroy: sk_idchangelistenerlist_proc,
}
