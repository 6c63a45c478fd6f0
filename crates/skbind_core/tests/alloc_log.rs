//! Integration test for allocation logging
//!
//! Logging is process-wide, so everything runs in one test of its own binary.

mod common;

use common::{fresh_handle, init_tracing, Counters, Tracked};
use skbind_core::alloc_log::{self, AllocationHooks, NO_STACK_INFO};
use skbind_core::{BindingConfig, Proxy};
use std::sync::{Arc, Mutex};

#[test]
fn test_hooks_see_construction_and_finalization() {
    init_tracing();
    let events: Arc<Mutex<Vec<(&'static str, String)>>> = Arc::default();
    let record = |phase: &'static str| {
        let events = Arc::clone(&events);
        Some(Arc::new(move |site: &str| events.lock().unwrap().push((phase, site.to_string())))
            as alloc_log::AllocationCallback)
    };
    alloc_log::set_allocation_hooks(AllocationHooks {
        on_construct_enter: record("construct enter"),
        on_construct_exit: record("construct exit"),
        on_finalize_enter: record("finalize enter"),
        on_finalize_exit: record("finalize exit"),
    });

    // Off by default: no site, no hooks.
    let counters = Arc::new(Counters::default());
    let quiet = Proxy::new(fresh_handle(), true, Tracked::new(&counters)).unwrap();
    assert!(quiet.core().alloc_site().is_none());
    drop(quiet);
    assert!(events.lock().unwrap().is_empty());

    BindingConfig::from_toml_str("log_allocations = true").unwrap().apply();
    assert!(alloc_log::allocation_logging_enabled());

    let leaked = Proxy::new(fresh_handle(), true, Tracked::new(&counters)).unwrap();
    assert_eq!(leaked.core().alloc_site(), Some(NO_STACK_INFO));
    drop(leaked);

    // Explicit disposal is not a finalization.
    let disposed = Proxy::new(fresh_handle(), true, Tracked::new(&counters)).unwrap();
    disposed.dispose();
    drop(disposed);

    let phases: Vec<_> = events.lock().unwrap().iter().map(|(phase, _)| *phase).collect();
    assert_eq!(
        phases,
        vec![
            "construct enter",
            "construct exit",
            "finalize enter",
            "finalize exit",
            "construct enter",
            "construct exit",
        ]
    );
    assert!(events.lock().unwrap().iter().all(|(_, site)| site == NO_STACK_INFO));
    assert_eq!(counters.destroys(), 3);

    BindingConfig {
        log_allocations: true,
        capture_backtraces: true,
    }
    .apply();
    let traced = Proxy::new(fresh_handle(), true, Tracked::new(&counters)).unwrap();
    assert!(traced.core().alloc_site().is_some());
    traced.dispose();

    BindingConfig::default().apply();
    alloc_log::clear_allocation_hooks();
    assert!(!alloc_log::allocation_logging_enabled());
}
