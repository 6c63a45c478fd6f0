//! skbind core
//!
//! Object lifetime and handle ownership for wrappers over a native 2D
//! graphics library.
//!
//! # Features
//!
//! - One proxy per native handle, deduplicated through a weak registry
//! - Disposal that runs at most once, from any thread
//! - Owned and kept-alive child graphs between proxies
//! - Virtual and non-virtual reference counting
//! - Context tokens and trampolines for native callbacks
//! - Optional allocation logging

pub mod alloc_log;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handle;
pub mod object;
pub mod refcnt;
pub mod registry;

pub use bridge::{
    dispatch, dispatch_destroy, Borrowed, BridgeTarget, BridgedKind, ContextTable, ContextToken, NativeBridge,
    ProcTable,
};
pub use config::BindingConfig;
pub use error::{ConfigError, Error, Result};
pub use handle::Handle;
pub use object::{
    own_or_dispose, transfer_ownership_to_native, DisposeState, ManagedObject, NativeKind, NativeWrapper,
    ObjectCore, Proxy,
};
pub use refcnt::{RefCounted, RefCounting, VirtualRefCnt};
pub use registry::{Acquired, HandleRegistry};
