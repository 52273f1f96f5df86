//! Public macros for fail-fast resolution.

/// Resolves a shared dependency from a container, failing when nothing in the
/// container chain caches it.
///
/// Expands to [`DependencyContainer::require`](crate::DependencyContainer::require)
/// and so evaluates to a `Result<Arc<T>, fibre_di::Error>`. A missing key is
/// reported as `Error::NotCached`.
///
/// # Examples
///
/// ```
/// use fibre_di::{resolve, DependencyContainer};
/// use std::sync::Arc;
///
/// let mut container = DependencyContainer::new();
/// container.cache(Arc::new(String::from("hello"))).unwrap();
///
/// let message = resolve!(container, String).unwrap();
/// assert_eq!(*message, "hello");
/// assert!(resolve!(container, String, "missing").is_err());
/// ```
///
/// ```
/// use fibre_di::{resolve, DependencyContainer};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync { fn greet(&self) -> String; }
/// struct EnglishGreeter;
/// impl Greeter for EnglishGreeter { fn greet(&self) -> String { "Hello!".to_string() } }
///
/// let mut container = DependencyContainer::new();
/// container.cache_as::<dyn Greeter>(Arc::new(EnglishGreeter)).unwrap();
///
/// let greeter = resolve!(container, trait Greeter).unwrap();
/// assert_eq!(greeter.greet(), "Hello!");
/// ```
#[macro_export]
macro_rules! resolve {
    // resolve!(container, trait MyTrait)
    ($container:expr, trait $trait_ident:ident) => {
        $container.require::<dyn $trait_ident>(None)
    };

    // resolve!(container, trait MyTrait, "name")
    ($container:expr, trait $trait_ident:ident, $name:expr) => {
        $container.require::<dyn $trait_ident>(Some(&$crate::CacheInfo::named($name)))
    };

    // resolve!(container, MyService)
    ($container:expr, $type:ty) => {
        $container.require::<$type>(None)
    };

    // resolve!(container, MyService, "name")
    ($container:expr, $type:ty, $name:expr) => {
        $container.require::<$type>(Some(&$crate::CacheInfo::named($name)))
    };
}
