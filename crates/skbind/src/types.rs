//! Value types
//!
//! Plain `#[repr(C)]` data laid out like the native structs, so slices can be
//! handed to native code with `bytemuck` casts instead of copies.

use bytemuck::{Pod, Zeroable};
use skbind_native::{
    sk_clipop_t, sk_matrix_concat, sk_matrix_map_point, sk_matrix_t, sk_matrix_try_invert, sk_paint_style_t,
    sk_point_t, sk_rect_t, sk_runtimeeffect_child_type_t, sk_runtimeeffect_kind_t, sk_runtimeeffect_uniform_type_t,
    sk_vertices_vertex_mode_t,
};

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<Point> for sk_point_t {
    fn from(point: Point) -> Self {
        bytemuck::cast(point)
    }
}

impl From<sk_point_t> for Point {
    fn from(point: sk_point_t) -> Self {
        bytemuck::cast(point)
    }
}

/// An axis-aligned rectangle given by its edges
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_wh(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }
}

impl From<Rect> for sk_rect_t {
    fn from(rect: Rect) -> Self {
        bytemuck::cast(rect)
    }
}

impl From<sk_rect_t> for Rect {
    fn from(rect: sk_rect_t) -> Self {
        bytemuck::cast(rect)
    }
}

/// Row-major 3x3 transform
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix {
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

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
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

    pub const fn translate(dx: f32, dy: f32) -> Self {
        Self {
            trans_x: dx,
            trans_y: dy,
            ..Self::IDENTITY
        }
    }

    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            scale_x: sx,
            scale_y: sy,
            ..Self::IDENTITY
        }
    }

    /// `self * other`: `other` is applied to points first.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        let mut result = sk_matrix_t::IDENTITY;
        let (first, second): (sk_matrix_t, sk_matrix_t) = ((*self).into(), (*other).into());
        // SAFETY: all three pointers refer to live locals.
        unsafe { sk_matrix_concat(&mut result, &first, &second) };
        result.into()
    }

    pub fn invert(&self) -> Option<Matrix> {
        let mut result = sk_matrix_t::IDENTITY;
        let source: sk_matrix_t = (*self).into();
        // SAFETY: both pointers refer to live locals.
        unsafe { sk_matrix_try_invert(&source, &mut result) }.then(|| result.into())
    }

    pub fn map_point(&self, point: Point) -> Point {
        let mut result = sk_point_t::default();
        let source: sk_matrix_t = (*self).into();
        // SAFETY: both pointers refer to live locals.
        unsafe { sk_matrix_map_point(&source, point.x, point.y, &mut result) };
        result.into()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<Matrix> for sk_matrix_t {
    fn from(matrix: Matrix) -> Self {
        bytemuck::cast(matrix)
    }
}

impl From<sk_matrix_t> for Matrix {
    fn from(matrix: sk_matrix_t) -> Self {
        bytemuck::cast(matrix)
    }
}

/// 32-bit ARGB color
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Color(pub u32);

impl Color {
    pub const TRANSPARENT: Color = Color(0x0000_0000);
    pub const BLACK: Color = Color(0xFF00_0000);
    pub const WHITE: Color = Color(0xFFFF_FFFF);
    pub const RED: Color = Color(0xFFFF_0000);
    pub const GREEN: Color = Color(0xFF00_FF00);
    pub const BLUE: Color = Color(0xFF00_00FF);

    pub const fn from_argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    pub const fn with_alpha(self, alpha: u8) -> Self {
        Self(self.0 & 0x00FF_FFFF | (alpha as u32) << 24)
    }
}

/// Blend modes, numbered as the native library numbers them
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum BlendMode {
    Clear = 0,
    Src,
    Dst,
    #[default]
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcATop,
    DstATop,
    Xor,
    Plus,
    Modulate,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    const ALL: [BlendMode; 29] = [
        BlendMode::Clear,
        BlendMode::Src,
        BlendMode::Dst,
        BlendMode::SrcOver,
        BlendMode::DstOver,
        BlendMode::SrcIn,
        BlendMode::DstIn,
        BlendMode::SrcOut,
        BlendMode::DstOut,
        BlendMode::SrcATop,
        BlendMode::DstATop,
        BlendMode::Xor,
        BlendMode::Plus,
        BlendMode::Modulate,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
        BlendMode::ColorDodge,
        BlendMode::ColorBurn,
        BlendMode::HardLight,
        BlendMode::SoftLight,
        BlendMode::Difference,
        BlendMode::Exclusion,
        BlendMode::Multiply,
        BlendMode::Hue,
        BlendMode::Saturation,
        BlendMode::Color,
        BlendMode::Luminosity,
    ];

    pub fn to_native(self) -> i32 {
        self as i32
    }

    /// `None` for numbers outside the known range.
    pub fn from_native(mode: i32) -> Option<Self> {
        usize::try_from(mode).ok().and_then(|index| Self::ALL.get(index).copied())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClipOp {
    Difference,
    #[default]
    Intersect,
}

impl From<ClipOp> for sk_clipop_t {
    fn from(op: ClipOp) -> Self {
        match op {
            ClipOp::Difference => sk_clipop_t::Difference,
            ClipOp::Intersect => sk_clipop_t::Intersect,
        }
    }
}

impl From<sk_clipop_t> for ClipOp {
    fn from(op: sk_clipop_t) -> Self {
        match op {
            sk_clipop_t::Difference => ClipOp::Difference,
            sk_clipop_t::Intersect => ClipOp::Intersect,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VertexMode {
    #[default]
    Triangles,
    TriangleStrip,
    TriangleFan,
}

impl From<VertexMode> for sk_vertices_vertex_mode_t {
    fn from(mode: VertexMode) -> Self {
        match mode {
            VertexMode::Triangles => sk_vertices_vertex_mode_t::Triangles,
            VertexMode::TriangleStrip => sk_vertices_vertex_mode_t::TriangleStrip,
            VertexMode::TriangleFan => sk_vertices_vertex_mode_t::TriangleFan,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
    StrokeAndFill,
}

impl From<PaintStyle> for sk_paint_style_t {
    fn from(style: PaintStyle) -> Self {
        match style {
            PaintStyle::Fill => sk_paint_style_t::Fill,
            PaintStyle::Stroke => sk_paint_style_t::Stroke,
            PaintStyle::StrokeAndFill => sk_paint_style_t::StrokeAndFill,
        }
    }
}

impl From<sk_paint_style_t> for PaintStyle {
    fn from(style: sk_paint_style_t) -> Self {
        match style {
            sk_paint_style_t::Fill => PaintStyle::Fill,
            sk_paint_style_t::Stroke => PaintStyle::Stroke,
            sk_paint_style_t::StrokeAndFill => PaintStyle::StrokeAndFill,
        }
    }
}

/// What a runtime effect produces
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectKind {
    Shader,
    ColorFilter,
    Blender,
}

impl From<sk_runtimeeffect_kind_t> for EffectKind {
    fn from(kind: sk_runtimeeffect_kind_t) -> Self {
        match kind {
            sk_runtimeeffect_kind_t::Shader => EffectKind::Shader,
            sk_runtimeeffect_kind_t::ColorFilter => EffectKind::ColorFilter,
            sk_runtimeeffect_kind_t::Blender => EffectKind::Blender,
        }
    }
}

/// What a runtime effect child slot accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildType {
    Shader,
    ColorFilter,
    Blender,
}

impl From<sk_runtimeeffect_child_type_t> for ChildType {
    fn from(ty: sk_runtimeeffect_child_type_t) -> Self {
        match ty {
            sk_runtimeeffect_child_type_t::Shader => ChildType::Shader,
            sk_runtimeeffect_child_type_t::ColorFilter => ChildType::ColorFilter,
            sk_runtimeeffect_child_type_t::Blender => ChildType::Blender,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformType {
    Float,
    Float2,
    Float3,
    Float4,
    Float2x2,
    Float3x3,
    Float4x4,
    Int,
    Int2,
    Int3,
    Int4,
}

impl UniformType {
    /// Number of scalar components
    pub fn components(self) -> usize {
        match self {
            UniformType::Float | UniformType::Int => 1,
            UniformType::Float2 | UniformType::Int2 => 2,
            UniformType::Float3 | UniformType::Int3 => 3,
            UniformType::Float4 | UniformType::Int4 | UniformType::Float2x2 => 4,
            UniformType::Float3x3 => 9,
            UniformType::Float4x4 => 16,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            UniformType::Int | UniformType::Int2 | UniformType::Int3 | UniformType::Int4
        )
    }
}

impl From<sk_runtimeeffect_uniform_type_t> for UniformType {
    fn from(ty: sk_runtimeeffect_uniform_type_t) -> Self {
        use sk_runtimeeffect_uniform_type_t as T;
        match ty {
            T::Float => UniformType::Float,
            T::Float2 => UniformType::Float2,
            T::Float3 => UniformType::Float3,
            T::Float4 => UniformType::Float4,
            T::Float2x2 => UniformType::Float2x2,
            T::Float3x3 => UniformType::Float3x3,
            T::Float4x4 => UniformType::Float4x4,
            T::Int => UniformType::Int,
            T::Int2 => UniformType::Int2,
            T::Int3 => UniformType::Int3,
            T::Int4 => UniformType::Int4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_components() {
        let color = Color::from_argb(0x80, 0x10, 0x20, 0x30);
        assert_eq!(color, Color(0x8010_2030));
        assert_eq!(
            (color.alpha(), color.red(), color.green(), color.blue()),
            (0x80, 0x10, 0x20, 0x30)
        );
        assert_eq!(Color::RED.with_alpha(0), Color(0x00FF_0000));
    }

    #[test]
    fn test_matrix_concat_applies_right_operand_first() {
        let m = Matrix::translate(10.0, 0.0).concat(&Matrix::scale(2.0, 2.0));
        assert_eq!(m.map_point(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
    }

    #[test]
    fn test_matrix_invert() {
        let m = Matrix::scale(2.0, 4.0);
        let inverse = m.invert().unwrap();
        assert_eq!(inverse.map_point(Point::new(2.0, 4.0)), Point::new(1.0, 1.0));
        assert!(Matrix::scale(0.0, 1.0).invert().is_none());
    }

    #[test]
    fn test_rect_geometry() {
        let rect = Rect::from_xywh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect, Rect::new(10.0, 20.0, 40.0, 60.0));
        assert_eq!((rect.width(), rect.height()), (30.0, 40.0));
        assert!(!rect.is_empty());
        assert!(Rect::default().is_empty());
    }

    #[test]
    fn test_blend_mode_numbering() {
        assert_eq!(BlendMode::Clear.to_native(), 0);
        assert_eq!(BlendMode::SrcOver.to_native(), 3);
        assert_eq!(BlendMode::Luminosity.to_native(), 28);
        assert_eq!(BlendMode::from_native(12), Some(BlendMode::Plus));
        assert_eq!(BlendMode::from_native(29), None);
        assert_eq!(BlendMode::from_native(-1), None);
    }
}
