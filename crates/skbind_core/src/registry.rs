//! Handle registry
//!
//! Maps live native handles to the single proxy wrapping each of them, so a
//! handle observed twice yields the same proxy. Entries hold weak references:
//! the registry never keeps a proxy alive. Entries whose proxy is dead or
//! disposed read as absent and are replaced by the next [`get_or_add`] for the
//! same handle value.
//!
//! [`get_or_add`]: HandleRegistry::get_or_add

use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::object::{ManagedObject, NativeKind, Proxy};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use std::sync::{Arc, OnceLock, Weak};

static GLOBAL: OnceLock<HandleRegistry> = OnceLock::new();

/// How [`HandleRegistry::get_or_add_with_status`] produced its proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    Existing,
    Created,
}

/// Process-wide map from handle to proxy.
pub struct HandleRegistry {
    entries: DashMap<Handle, Weak<dyn ManagedObject>, FxBuildHasher>,
}

impl HandleRegistry {
    /// The registry shared by every proxy, created on first use.
    pub fn global() -> &'static HandleRegistry {
        GLOBAL.get_or_init(|| HandleRegistry {
            entries: DashMap::with_hasher(FxBuildHasher::default()),
        })
    }

    /// Associates `handle` with `proxy`.
    ///
    /// An entry whose proxy is dead or disposing is replaced. An entry whose
    /// proxy is still live is kept and the call fails with
    /// [`Error::InvalidOperation`]: a handle never has two live proxies.
    pub fn register(&self, handle: Handle, proxy: Weak<dyn ManagedObject>) -> Result<()> {
        if handle.is_null() {
            return Ok(());
        }
        // Dropped after the entry guard, see `get_or_add_with_status`.
        let mut previous: Option<Arc<dyn ManagedObject>> = None;
        let result = match self.entries.entry(handle) {
            Entry::Occupied(mut occupied) => {
                let same = occupied.get().as_ptr() as *const () == proxy.as_ptr() as *const ();
                previous = occupied.get().upgrade();
                match &previous {
                    Some(existing) if !same && !existing.is_disposed() => Err(Error::InvalidOperation(format!(
                        "handle {handle} is already wrapped by a live {}",
                        existing.type_name()
                    ))),
                    _ => {
                        occupied.insert(proxy);
                        tracing::debug!(target: "skbind::registry", %handle, "replaced stale registration");
                        Ok(())
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(proxy);
                tracing::trace!(target: "skbind::registry", %handle, "registered");
                Ok(())
            }
        };
        drop(previous);
        if let Err(err) = &result {
            tracing::warn!(target: "skbind::registry", %handle, %err, "registration refused");
        }
        result
    }

    /// Removes the entry for `handle` if it still refers to the proxy at
    /// `identity`. A handle that was already re-registered by a newer proxy
    /// is left alone.
    pub fn deregister(&self, handle: Handle, identity: *const ()) -> bool {
        let removed = self
            .entries
            .remove_if(&handle, |_, weak| weak.as_ptr() as *const () == identity)
            .is_some();
        if removed {
            tracing::trace!(target: "skbind::registry", %handle, "deregistered");
        }
        removed
    }

    /// The live, undisposed proxy for `handle`, of any kind.
    pub fn try_get_object(&self, handle: Handle) -> Option<Arc<dyn ManagedObject>> {
        if handle.is_null() {
            return None;
        }
        let object = self.entries.get(&handle)?.upgrade();
        object.filter(|object| !object.is_disposed())
    }

    /// The live, undisposed proxy for `handle`, if it is of kind `K`.
    pub fn try_get<K: NativeKind>(&self, handle: Handle) -> Option<Arc<Proxy<K>>> {
        self.try_get_object(handle)?.into_any().downcast::<Proxy<K>>().ok()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.try_get_object(handle).is_some()
    }

    /// Number of entries, including ones whose proxy has since died.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the proxy for `handle`, creating it with `factory` if there is
    /// none.
    ///
    /// - A null handle yields `Ok(None)`.
    /// - An existing proxy is returned as is; when `unref_existing` is set,
    ///   the reference the caller received with the handle is released
    ///   because the existing proxy already holds one.
    /// - Otherwise `factory(handle, owns)` builds the kind and the new proxy
    ///   is inserted. If the factory fails nothing is inserted.
    ///
    /// The factory and the allocation hooks run without any registry lock
    /// held, so they may use the registry themselves. When another thread
    /// registers the handle first, its proxy wins and the one built here is
    /// discarded without touching the native object.
    ///
    /// Kinds with `REGISTERED = false` always get a fresh, unregistered proxy.
    pub fn get_or_add<K, F>(
        &self,
        handle: Handle,
        owns: bool,
        unref_existing: bool,
        factory: F,
    ) -> Result<Option<Arc<Proxy<K>>>>
    where
        K: NativeKind,
        F: FnOnce(Handle, bool) -> Result<K>,
    {
        Ok(self
            .get_or_add_with_status(handle, owns, unref_existing, factory)?
            .map(|(proxy, _)| proxy))
    }

    /// Like [`get_or_add`](Self::get_or_add), also reporting whether the
    /// proxy already existed.
    pub fn get_or_add_with_status<K, F>(
        &self,
        handle: Handle,
        owns: bool,
        unref_existing: bool,
        factory: F,
    ) -> Result<Option<(Arc<Proxy<K>>, Acquired)>>
    where
        K: NativeKind,
        F: FnOnce(Handle, bool) -> Result<K>,
    {
        if handle.is_null() {
            return Ok(None);
        }
        if !K::REGISTERED {
            let kind = factory(handle, owns)?;
            return Ok(Some((Proxy::new_unregistered(handle, owns, kind), Acquired::Created)));
        }

        if let Some(existing) = self.try_get_object(handle) {
            return found(handle, existing, unref_existing).map(Some);
        }

        let proxy = Proxy::new_unregistered(handle, owns, factory(handle, owns)?);
        let weak = Arc::downgrade(&proxy) as Weak<dyn ManagedObject>;

        // Declared before the entry guard so it is dropped after the guard:
        // dropping the last reference to a stale proxy deregisters it, which
        // needs the same shard lock.
        let mut stale: Option<Arc<dyn ManagedObject>> = None;

        let winner = match self.entries.entry(handle) {
            Entry::Occupied(mut occupied) => match occupied.get().upgrade() {
                Some(existing) if !existing.is_disposed() => Some(existing),
                dead => {
                    stale = dead;
                    occupied.insert(weak);
                    tracing::debug!(target: "skbind::registry", %handle, "replaced stale registration");
                    None
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(weak);
                tracing::trace!(target: "skbind::registry", %handle, type_name = K::TYPE_NAME, "registered");
                None
            }
        };
        drop(stale);

        match winner {
            None => Ok(Some((proxy, Acquired::Created))),
            Some(existing) => {
                tracing::debug!(target: "skbind::registry", %handle, "lost registration race");
                proxy.detach();
                drop(proxy);
                found(handle, existing, unref_existing).map(Some)
            }
        }
    }

    /// Wraps the result of a native create call that may hand out an object
    /// which is already wrapped, such as a shared singleton.
    ///
    /// The caller's reference is given to the new proxy, or released when a
    /// live proxy already holds one. A null handle is
    /// [`Error::CreateFailed`].
    pub fn acquire_created<K, F>(&self, handle: Handle, factory: F) -> Result<Arc<Proxy<K>>>
    where
        K: NativeKind,
        F: FnOnce(Handle, bool) -> Result<K>,
    {
        self.get_or_add(handle, true, true, factory)?
            .ok_or(Error::CreateFailed(K::TYPE_NAME))
    }
}

fn found<K: NativeKind>(
    handle: Handle,
    existing: Arc<dyn ManagedObject>,
    unref_existing: bool,
) -> Result<(Arc<Proxy<K>>, Acquired)> {
    if unref_existing {
        tracing::debug!(target: "skbind::registry", %handle, "releasing redundant reference");
        K::release_redundant_ref(handle);
    }
    let actual = existing.type_name();
    match existing.into_any().downcast::<Proxy<K>>() {
        Ok(proxy) => Ok((proxy, Acquired::Existing)),
        Err(_) => Err(Error::TypeMismatch {
            handle,
            expected: K::TYPE_NAME,
            actual,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT: AtomicUsize = AtomicUsize::new(0x6000_0000);

    fn fresh_handle() -> Handle {
        Handle::from_raw(NEXT.fetch_add(0x10, Ordering::Relaxed))
    }

    struct Plain;

    impl NativeKind for Plain {
        const TYPE_NAME: &'static str = "Plain";

        fn dispose_native(&self, _handle: Handle) {}
    }

    struct Other;

    impl NativeKind for Other {
        const TYPE_NAME: &'static str = "Other";

        fn dispose_native(&self, _handle: Handle) {}
    }

    #[test]
    fn test_null_handle_yields_none() {
        let registry = HandleRegistry::global();
        let result = registry.get_or_add(Handle::NULL, true, true, |_, _| Ok(Plain)).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_failing_factory_inserts_nothing() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let result = registry.get_or_add::<Plain, _>(handle, true, true, |_, _| Err(Error::CreateFailed("Plain")));
        assert_eq!(result.unwrap_err(), Error::CreateFailed("Plain"));
        assert!(!registry.contains(handle));
    }

    #[test]
    fn test_existing_proxy_is_returned() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let (first, how) = registry
            .get_or_add_with_status(handle, true, false, |_, _| Ok(Plain))
            .unwrap()
            .unwrap();
        assert_eq!(how, Acquired::Created);
        let (second, how) = registry
            .get_or_add_with_status(handle, true, false, |_, _| Ok(Plain))
            .unwrap()
            .unwrap();
        assert_eq!(how, Acquired::Existing);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_dead_entry_is_replaced() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let first = registry.get_or_add(handle, false, false, |_, _| Ok(Plain)).unwrap().unwrap();
        first.dispose();
        assert!(!registry.contains(handle));
        let (second, how) = registry
            .get_or_add_with_status(handle, false, false, |_, _| Ok(Plain))
            .unwrap()
            .unwrap();
        assert_eq!(how, Acquired::Created);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(registry.contains(handle));
    }

    #[test]
    fn test_kind_mismatch_is_an_error() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let _plain = registry.get_or_add(handle, false, false, |_, _| Ok(Plain)).unwrap().unwrap();
        let err = registry.get_or_add(handle, false, false, |_, _| Ok(Other)).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                handle,
                expected: "Other",
                actual: "Plain"
            }
        );
        assert!(registry.try_get::<Other>(handle).is_none());
        assert!(registry.try_get::<Plain>(handle).is_some());
    }

    #[test]
    fn test_stale_deregister_keeps_newer_entry() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let first = registry.get_or_add(handle, false, false, |_, _| Ok(Plain)).unwrap().unwrap();
        first.dispose();
        let second = Proxy::new(handle, false, Plain).unwrap();
        assert!(!registry.deregister(handle, first.identity()));
        let found = registry.try_get::<Plain>(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn test_second_live_proxy_is_refused() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let first = Proxy::new(handle, false, Plain).unwrap();
        let err = Proxy::new(handle, false, Plain).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
        let found = registry.try_get::<Plain>(handle).unwrap();
        assert!(Arc::ptr_eq(&found, &first));
    }

    #[test]
    fn test_factory_may_use_the_registry() {
        let registry = HandleRegistry::global();
        let outer = fresh_handle();
        let inner = fresh_handle();
        let mut nested = None;
        let proxy = registry
            .get_or_add(outer, false, false, |_, _| {
                assert!(!registry.contains(outer));
                nested = registry.get_or_add(inner, false, false, |_, _| Ok(Other))?;
                Ok(Plain)
            })
            .unwrap()
            .unwrap();
        assert!(registry.contains(outer));
        assert!(Arc::ptr_eq(&registry.try_get::<Other>(inner).unwrap(), &nested.unwrap()));
        drop(proxy);
    }

    struct Counted(Arc<AtomicUsize>);

    impl NativeKind for Counted {
        const TYPE_NAME: &'static str = "Counted";

        fn dispose_native(&self, _handle: Handle) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_concurrent_get_or_add_agrees_on_one_proxy() {
        let registry = HandleRegistry::global();
        let handle = fresh_handle();
        let destroys = Arc::new(AtomicUsize::new(0));
        let barrier = std::sync::Barrier::new(8);
        let proxies: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry
                            .get_or_add(handle, true, false, |_, _| Ok(Counted(Arc::clone(&destroys))))
                            .unwrap()
                            .unwrap()
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join().unwrap()).collect()
        });
        assert!(proxies.iter().all(|proxy| Arc::ptr_eq(proxy, &proxies[0])));
        assert_eq!(destroys.load(Ordering::SeqCst), 0);
        drop(proxies);
        assert_eq!(destroys.load(Ordering::SeqCst), 1);
        assert!(!registry.contains(handle));
    }
}
