//! skbind
//!
//! Typed wrappers over the native 2D graphics layer. Every wrapper is a cheap
//! handle to one managed proxy, so clones share identity and a native object
//! is never wrapped twice.
//!
//! # Features
//!
//! - Recording, n-way and callback canvases
//! - Paints with shader, image filter and blender effects
//! - Runtime effects with uniform and child introspection, and builders
//! - Vertices with validated copies
//! - ID change listeners and listener lists
//! - Disposal from either side of the native boundary

#[macro_use]
mod macros;

pub mod blender;
pub mod callback_canvas;
pub mod canvas;
pub mod canvas_forwarder;
pub mod id_change_listener;
pub mod image_filter;
pub mod paint;
pub mod runtime_effect;
pub mod runtime_effect_builder;
pub mod shader;
pub mod string;
pub mod testbed;
pub mod types;
pub mod vertices;

pub use blender::Blender;
pub use callback_canvas::{CallbackCanvas, CanvasCallbacks};
pub use canvas::{AutoCanvasRestore, Canvas, CanvasOps, DrawOp, NWayCanvas};
pub use canvas_forwarder::CanvasForwarder;
pub use id_change_listener::{IdChangeHandler, IdChangeListener, IdChangeListenerList};
pub use image_filter::ImageFilter;
pub use paint::Paint;
pub use runtime_effect::{EffectChild, RuntimeEffect, Uniform};
pub use runtime_effect_builder::RuntimeEffectBuilder;
pub use shader::Shader;
pub use string::SkString;
pub use testbed::testbed;
pub use types::*;
pub use vertices::Vertices;

pub use skbind_core::{BindingConfig, Error, Handle, NativeWrapper, Result};

/// Common imports for wrapper users.
pub mod prelude {
    pub use crate::callback_canvas::{CallbackCanvas, CanvasCallbacks};
    pub use crate::canvas::{AutoCanvasRestore, Canvas, CanvasOps, NWayCanvas};
    pub use crate::id_change_listener::{IdChangeHandler, IdChangeListener, IdChangeListenerList};
    pub use crate::types::{BlendMode, ClipOp, Color, Matrix, PaintStyle, Point, Rect, VertexMode};
    pub use crate::{Blender, ImageFilter, Paint, RuntimeEffect, RuntimeEffectBuilder, Shader, Vertices};
    pub use skbind_core::{Error, NativeWrapper, Result};
}
