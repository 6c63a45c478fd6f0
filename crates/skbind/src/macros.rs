//! Declaration helpers for wrapper types

/// Declares a newtype over `Arc<Proxy<Kind>>` and implements
/// [`NativeWrapper`](skbind_core::NativeWrapper) for it.
macro_rules! native_wrapper {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($kind:ty);) => {
        $(#[$meta])*
        #[derive(Clone)]
        $vis struct $name(::std::sync::Arc<::skbind_core::Proxy<$kind>>);

        impl ::skbind_core::NativeWrapper for $name {
            type Kind = $kind;

            fn from_proxy(proxy: ::std::sync::Arc<::skbind_core::Proxy<$kind>>) -> Self {
                Self(proxy)
            }

            fn proxy(&self) -> &::std::sync::Arc<::skbind_core::Proxy<$kind>> {
                &self.0
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }
    };
}

/// Declares the kind of a virtually reference-counted native type.
macro_rules! virtual_ref_counted_kind {
    ($(#[$meta:meta])* $vis:vis struct $name:ident = $type_name:literal;) => {
        $(#[$meta])*
        $vis struct $name;

        impl ::skbind_core::NativeKind for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn dispose_native(&self, handle: ::skbind_core::Handle) {
                ::skbind_core::refcnt::safe_unref::<Self>(handle);
            }

            fn release_redundant_ref(handle: ::skbind_core::Handle) {
                ::skbind_core::refcnt::safe_unref::<Self>(handle);
            }
        }

        impl ::skbind_core::RefCounted for $name {
            type Counting = ::skbind_core::VirtualRefCnt;
        }
    };
}
