//! Allocation logging
//!
//! When enabled, every proxy records where it was constructed and reports its
//! construction and finalization to the `skbind::alloc` tracing target and to
//! any installed [`AllocationHooks`]. Finalization here means a proxy dropped
//! without an explicit dispose having run first.
//!
//! ```ignore
//! use skbind_core::alloc_log::{self, AllocationHooks};
//! use std::sync::Arc;
//!
//! alloc_log::set_allocation_hooks(AllocationHooks {
//!     on_finalize_enter: Some(Arc::new(|site| eprintln!("leaked: {site}"))),
//!     ..Default::default()
//! });
//! alloc_log::set_allocation_logging(true);
//! ```

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Site string used when no backtrace was captured.
pub const NO_STACK_INFO: &str = "No Stack Info";

/// Receives the allocation site of the proxy being constructed or finalized.
pub type AllocationCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct AllocationHooks {
    pub on_construct_enter: Option<AllocationCallback>,
    pub on_construct_exit: Option<AllocationCallback>,
    pub on_finalize_enter: Option<AllocationCallback>,
    pub on_finalize_exit: Option<AllocationCallback>,
}

static LOG_ALLOCATIONS: AtomicBool = AtomicBool::new(false);
static CAPTURE_BACKTRACES: AtomicBool = AtomicBool::new(false);
static HOOKS: OnceLock<RwLock<AllocationHooks>> = OnceLock::new();

fn hooks() -> &'static RwLock<AllocationHooks> {
    HOOKS.get_or_init(|| RwLock::new(AllocationHooks::default()))
}

pub fn set_allocation_logging(enabled: bool) {
    LOG_ALLOCATIONS.store(enabled, Ordering::Release);
}

pub fn allocation_logging_enabled() -> bool {
    LOG_ALLOCATIONS.load(Ordering::Acquire)
}

/// Capture a backtrace for every proxy while allocation logging is on.
pub fn set_capture_backtraces(enabled: bool) {
    CAPTURE_BACKTRACES.store(enabled, Ordering::Release);
}

pub fn set_allocation_hooks(new_hooks: AllocationHooks) {
    *hooks().write().unwrap_or_else(PoisonError::into_inner) = new_hooks;
}

pub fn clear_allocation_hooks() {
    set_allocation_hooks(AllocationHooks::default());
}

/// The site recorded for a new proxy, or `None` when logging is off.
pub(crate) fn capture_site() -> Option<Arc<str>> {
    if !allocation_logging_enabled() {
        return None;
    }
    if !CAPTURE_BACKTRACES.load(Ordering::Acquire) {
        return Some(Arc::from(NO_STACK_INFO));
    }
    let trace = Backtrace::force_capture().to_string();
    if trace.trim().is_empty() {
        Some(Arc::from(NO_STACK_INFO))
    } else {
        Some(Arc::from(trace))
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Phase {
    ConstructEnter,
    ConstructExit,
    FinalizeEnter,
    FinalizeExit,
}

pub(crate) fn notify(phase: Phase, type_name: &'static str, site: Option<&Arc<str>>) {
    let Some(site) = site else { return };
    let hook = {
        let hooks = hooks().read().unwrap_or_else(PoisonError::into_inner);
        match phase {
            Phase::ConstructEnter => hooks.on_construct_enter.clone(),
            Phase::ConstructExit => hooks.on_construct_exit.clone(),
            Phase::FinalizeEnter => hooks.on_finalize_enter.clone(),
            Phase::FinalizeExit => hooks.on_finalize_exit.clone(),
        }
    };
    match phase {
        Phase::ConstructEnter => tracing::trace!(target: "skbind::alloc", type_name, "construct"),
        Phase::FinalizeEnter => tracing::debug!(target: "skbind::alloc", type_name, site = %site, "finalize"),
        Phase::ConstructExit | Phase::FinalizeExit => {}
    }
    if let Some(hook) = hook {
        hook(site);
    }
}
