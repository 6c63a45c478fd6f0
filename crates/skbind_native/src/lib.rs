//! skbind native layer
//!
//! The C-ABI surface the bindings call into: opaque object pointers, plain
//! value structs, and `sk_*` entry points for creating, using and destroying
//! native objects.
//!
//! # Object families
//!
//! - **Owned**: paints, canvases, strings and runtime effect builders. The
//!   creator destroys them with the matching `*_delete`/`*_destroy` call.
//! - **Virtually ref-counted**: shaders, blenders, image filters, runtime
//!   effects and ID-change listeners, released through `sk_refcnt_safe_unref`
//!   or a typed `*_unref`.
//! - **Non-virtually ref-counted**: vertices, released with `sk_vertices_unref`.
//! - **Managed callback objects**: callback canvases, listeners and listener
//!   lists carry an opaque context pointer and invoke the procs registered for
//!   their type, including a destroy proc from their destructor.
//!
//! Every entry point tolerates null and already-destroyed pointers: misuse is
//! logged and recorded in [`debug`] rather than dereferenced.

#![allow(non_camel_case_types)]
#![allow(clippy::missing_safety_doc)]

mod canvas;
pub mod debug;
mod effects;
mod heap;
mod listener;
mod matrix;
mod paint;
mod refcnt;
mod runtime_effect;
mod string;
mod testbed;
pub mod types;
mod vertices;

pub use canvas::*;
pub use effects::*;
pub use heap::ObjectKind;
pub use listener::*;
pub use matrix::*;
pub use paint::*;
pub use refcnt::*;
pub use runtime_effect::*;
pub use string::*;
pub use testbed::*;
pub use types::*;
pub use vertices::*;
