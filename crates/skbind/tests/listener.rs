//! Integration tests for ID change listeners and listener lists

mod common;

use common::{destroys, init_tracing, object_id};
use skbind::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Default)]
struct Counts {
    changed: AtomicUsize,
    disposed: AtomicUsize,
}

impl Counts {
    fn changed(&self) -> usize {
        self.changed.load(Ordering::SeqCst)
    }

    fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct Handler(Arc<Counts>);

impl IdChangeHandler for Handler {
    fn changed(&self) {
        self.0.changed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_dispose(&self) {
        self.0.disposed.fetch_add(1, Ordering::SeqCst);
    }
}

fn listener() -> (IdChangeListener<Handler>, Arc<Counts>) {
    let handler = Handler::default();
    let counts = Arc::clone(&handler.0);
    (IdChangeListener::new(handler).unwrap(), counts)
}

#[test]
fn test_changed_fires_and_tears_down_listeners() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());

    list.add(&listener, true).unwrap();
    assert_eq!(list.count().unwrap(), 1);
    assert!(!listener.owns_handle());

    // The list owns the listener now.
    listener.dispose();
    assert!(!listener.is_disposed());

    list.changed(true).unwrap();

    assert_eq!(counts.changed(), 1);
    assert_eq!(counts.disposed(), 1);
    assert!(listener.is_disposed());
    assert!(listener.destroyed_natively());
    assert_eq!(destroys(id), 1);
    assert_eq!(list.count().unwrap(), 0);
}

#[test]
fn test_list_keeps_dropped_listener_until_it_fires() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());
    list.add(&listener, false).unwrap();
    drop(listener);

    assert_eq!(destroys(id), 0);
    list.changed(false).unwrap();

    assert_eq!(counts.changed(), 1);
    assert_eq!(counts.disposed(), 1);
    assert_eq!(destroys(id), 1);
}

#[test]
fn test_deregistered_listener_is_skipped() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let (skipped, skipped_counts) = listener();
    let (fired, fired_counts) = listener();
    list.add(&skipped, true).unwrap();
    list.add(&fired, true).unwrap();

    skipped.mark_should_deregister().unwrap();
    assert!(skipped.should_deregister().unwrap());
    list.changed(true).unwrap();

    assert_eq!(skipped_counts.changed(), 0);
    assert_eq!(skipped_counts.disposed(), 1);
    assert_eq!(fired_counts.changed(), 1);
    assert!(skipped.is_disposed() && fired.is_disposed());
}

#[test]
fn test_add_drops_deregistered_listeners() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let (stale, stale_counts) = listener();
    list.add(&stale, true).unwrap();
    stale.mark_should_deregister().unwrap();

    let (fresh, _) = listener();
    list.add(&fresh, true).unwrap();

    assert_eq!(list.count().unwrap(), 1);
    assert!(stale.is_disposed());
    assert_eq!(stale_counts.changed(), 0);
    assert_eq!(stale_counts.disposed(), 1);
    assert!(!fresh.is_disposed());
}

#[test]
fn test_reset_tears_down_without_firing() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let (listener, counts) = listener();
    list.add(&listener, true).unwrap();

    list.reset(true).unwrap();

    assert_eq!(counts.changed(), 0);
    assert_eq!(counts.disposed(), 1);
    assert!(listener.is_disposed());
    assert_eq!(list.count().unwrap(), 0);
}

#[test]
fn test_listener_can_only_be_added_once() {
    init_tracing();
    let first = IdChangeListenerList::new().unwrap();
    let second = IdChangeListenerList::new().unwrap();
    let (listener, _) = listener();
    first.add(&listener, true).unwrap();

    assert!(matches!(first.add(&listener, true), Err(Error::InvalidOperation(_))));
    assert!(matches!(second.add(&listener, true), Err(Error::InvalidOperation(_))));
    assert_eq!(first.count().unwrap(), 1);
    assert_eq!(second.count().unwrap(), 0);
}

#[test]
fn test_concurrent_adds_hand_the_listener_to_one_list() {
    init_tracing();
    let lists: Vec<_> = (0..8).map(|_| IdChangeListenerList::new().unwrap()).collect();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());
    let barrier = Barrier::new(lists.len());

    let added = thread::scope(|scope| {
        let workers: Vec<_> = lists
            .iter()
            .map(|list| {
                let (listener, barrier) = (&listener, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    list.add(listener, false)
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).collect::<Vec<_>>()
    });

    assert_eq!(added.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(added
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, Error::InvalidOperation(_))));
    let total: usize = lists.iter().map(|list| list.count().unwrap()).sum();
    assert_eq!(total, 1);

    for list in &lists {
        list.changed(false).unwrap();
    }
    assert_eq!(counts.changed(), 1);
    assert_eq!(counts.disposed(), 1);
    assert_eq!(destroys(id), 1);
}

#[test]
fn test_dispose_racing_the_native_destroy_tears_down_once() {
    use skbind::id_change_listener::IdChangeListenerNative;
    use skbind_core::refcnt;

    init_tracing();
    let double_frees = skbind_native::debug::double_free_count();
    for _ in 0..100 {
        let (listener, counts) = listener();
        let handle = listener.handle();
        let id = object_id(handle);
        // A second native owner, released on another thread.
        refcnt::safe_ref::<IdChangeListenerNative<Handler>>(handle);
        let barrier = Barrier::new(2);

        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                listener.dispose();
            });
            scope.spawn(|| {
                barrier.wait();
                refcnt::safe_unref::<IdChangeListenerNative<Handler>>(handle);
            });
        });

        assert!(listener.is_disposed());
        assert_eq!(destroys(id), 1);
        assert_eq!(counts.disposed(), 1);
    }
    assert_eq!(skbind_native::debug::double_free_count(), double_frees);
}

#[test]
fn test_standalone_listener_dispose() {
    init_tracing();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());

    listener.dispose();
    listener.dispose();

    assert!(listener.is_disposed());
    assert_eq!(counts.disposed(), 1);
    assert_eq!(destroys(id), 1);
    assert_eq!(listener.should_deregister(), Err(Error::ObjectDisposed("IdChangeListener")));
}

#[test]
fn test_dropped_listener_skips_on_dispose() {
    init_tracing();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());
    drop(listener);

    assert_eq!(destroys(id), 1);
    assert_eq!(counts.disposed(), 0);
}

#[test]
fn test_list_dispose_tears_down_listeners() {
    init_tracing();
    let list = IdChangeListenerList::new().unwrap();
    let list_id = object_id(list.handle());
    let (listener, counts) = listener();
    let id = object_id(listener.handle());
    list.add(&listener, true).unwrap();

    list.dispose();

    assert_eq!(destroys(list_id), 1);
    assert_eq!(destroys(id), 1);
    assert!(listener.is_disposed());
    assert_eq!(counts.changed(), 0);
    assert_eq!(counts.disposed(), 1);
    assert!(matches!(list.count(), Err(Error::ObjectDisposed("IdChangeListenerList"))));
}

#[test]
fn test_dropping_list_releases_listeners() {
    init_tracing();
    let (listener, counts) = listener();
    let id = object_id(listener.handle());
    {
        let list = IdChangeListenerList::new().unwrap();
        list.add(&listener, true).unwrap();
    }

    assert_eq!(destroys(id), 1);
    assert!(listener.is_disposed());
    assert!(listener.destroyed_natively());
    assert_eq!(counts.disposed(), 1);
}
