use fibre_di::{CacheInfo, CacheKey, DependencyContainer, Error, SlotKind, TypeTag};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// --- Test Fixtures ---

trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

struct Marker;

#[derive(Debug, Clone, Default, PartialEq)]
struct Point {
  x: i32,
  y: i32,
}

// --- Uniqueness ---

#[test]
fn test_second_write_of_a_key_fails() {
  let mut container = DependencyContainer::new();
  container.cache(Arc::new(String::from("first"))).unwrap();

  let err = container.cache(Arc::new(String::from("second"))).unwrap_err();
  assert!(matches!(err, Error::DuplicateCacheKey { .. }));
  assert_eq!(*container.get::<String>(None).unwrap(), "first");
}

#[test]
fn test_uniqueness_holds_across_write_paths() {
  let mut container = DependencyContainer::new();
  container.cache_value(1_i32).unwrap();

  assert!(matches!(
    container.cache_optional_value(Some(2_i32)),
    Err(Error::DuplicateCacheKey { .. })
  ));
  // A shared slot under the same type still collides on the key.
  assert!(matches!(
    container.cache(Arc::new(3_i32)),
    Err(Error::DuplicateCacheKey { .. })
  ));
  assert_eq!(container.len(), 1);
}

#[test]
fn test_qualified_keys_do_not_collide() {
  let mut container = DependencyContainer::new();
  container.cache_value(1_u16).unwrap();
  container
    .cache_value_with_info(2_u16, CacheInfo::named("port"))
    .unwrap();
  container
    .cache_value_with_info(3_u16, CacheInfo::new().with_parent::<Marker>())
    .unwrap();
  container
    .cache_value_with_info(4_u16, CacheInfo::named("").with_parent::<Marker>())
    .unwrap();
  container
    .cache_value_with_info(5_u16, CacheInfo::named(""))
    .unwrap();

  assert_eq!(container.len(), 5);
  assert_eq!(container.get_value::<u16>(None), 1);
  assert_eq!(container.get_value::<u16>(Some(&CacheInfo::named("port"))), 2);
  assert_eq!(
    container.get_value::<u16>(Some(&CacheInfo::new().with_parent::<Marker>())),
    3
  );
  assert_eq!(container.get_value::<u16>(Some(&CacheInfo::named(""))), 5);
  assert_eq!(container.get_value::<u16>(Some(&CacheInfo::named("other"))), 0);
}

// --- Hierarchy ---

#[test]
fn test_child_shadows_parent_without_touching_it() {
  let mut parent = DependencyContainer::new();
  parent.cache_value(String::from("parent")).unwrap();
  let parent = Arc::new(parent);

  let mut child = DependencyContainer::with_parent(parent.clone());
  child.cache_value(String::from("child")).unwrap();

  assert_eq!(child.get_value::<String>(None), "child");
  assert_eq!(parent.get_value::<String>(None), "parent");
}

#[test]
fn test_lookup_falls_back_through_the_chain() {
  let mut root = DependencyContainer::new();
  root.cache(Arc::new(String::from("root value"))).unwrap();
  let root = Arc::new(root);
  let child = Arc::new(DependencyContainer::with_parent(root.clone()));
  let grandchild = DependencyContainer::with_parent(child.clone());

  let from_root = root.get::<String>(None).unwrap();
  let from_child = child.get::<String>(None).unwrap();
  let from_grandchild = grandchild.get::<String>(None).unwrap();

  assert!(Arc::ptr_eq(&from_root, &from_child));
  assert!(Arc::ptr_eq(&from_root, &from_grandchild));
  assert!(!grandchild.contains_local(&CacheKey::of::<String>()));
  assert!(root.contains_local(&CacheKey::of::<String>()));
}

#[test]
fn test_siblings_do_not_see_each_other() {
  let root = Arc::new(DependencyContainer::new());
  let mut left = DependencyContainer::with_parent(root.clone());
  let right = DependencyContainer::with_parent(root.clone());

  left.cache_value(10_u64).unwrap();

  assert_eq!(left.get_value::<u64>(None), 10);
  assert_eq!(right.get_optional_value::<u64>(None), None);
  assert_eq!(root.get_optional_value::<u64>(None), None);
}

// --- Absence ---

#[test]
fn test_absent_values_resolve_to_defaults() {
  let container = DependencyContainer::new();

  assert!(container.get::<String>(None).is_none());
  assert!(container.get::<dyn Greeter>(None).is_none());
  assert_eq!(container.get_value::<i32>(None), 0);
  assert_eq!(container.get_value::<Point>(None), Point::default());
  assert_eq!(container.get_optional_value::<i32>(None), None);
  assert!(container.lookup(&CacheKey::of::<i32>()).is_none());
  assert!(container.is_empty());
}

#[test]
fn test_require_reports_missing_dependency() {
  let container = DependencyContainer::new();

  let err = container
    .require::<String>(Some(&CacheInfo::named("title")))
    .unwrap_err();
  match &err {
    Error::NotCached { key } => {
      assert_eq!(key.value_type(), TypeTag::of::<String>());
      assert_eq!(key.name(), Some("title"));
    }
    other => panic!("unexpected error: {other}"),
  }
  // A direct lookup names no member or declaring type.
  let message = err.to_string();
  assert!(message.contains("not cached"));
  assert!(!message.contains("DependencyContainer"));
}

// --- Value semantics ---

#[test]
fn test_struct_round_trip_preserves_the_value() {
  let mut container = DependencyContainer::new();
  let original = Point { x: 3, y: -4 };
  container.cache_value(original.clone()).unwrap();

  let mut copy = container.get_value::<Point>(None);
  assert_eq!(copy, original);

  // Each read is an independent copy.
  copy.x = 100;
  assert_eq!(container.get_value::<Point>(None), original);
}

#[test]
fn test_nullable_values_store_absence() {
  let mut container = DependencyContainer::new();
  container.cache_optional_value::<i32>(None).unwrap();
  container
    .cache_optional_value_with_info(Some(9_i32), CacheInfo::named("set"))
    .unwrap();

  let slot = container.lookup(&CacheKey::of::<i32>()).unwrap();
  assert_eq!(slot.kind(), SlotKind::Value);
  assert!(!slot.has_value());
  assert_eq!(container.get_optional_value::<i32>(None), None);
  assert_eq!(container.get_value::<i32>(None), 0);
  assert_eq!(
    container.get_optional_value::<i32>(Some(&CacheInfo::named("set"))),
    Some(9)
  );
}

#[test]
fn test_option_is_rejected_as_a_plain_value() {
  let mut container = DependencyContainer::new();

  assert!(matches!(
    container.cache_value(Some(5_i32)),
    Err(Error::InvalidCacheTarget { .. })
  ));
  assert!(matches!(
    container.cache_value_with_info(None::<i32>, CacheInfo::named("unset")),
    Err(Error::InvalidCacheTarget { .. })
  ));
  assert!(container.is_empty());

  // The nullable path keys by the payload type, so every reader sees it.
  container.cache_optional_value(Some(5_i32)).unwrap();
  assert_eq!(container.get_optional_value::<i32>(None), Some(5));
  assert_eq!(container.get_value::<i32>(None), 5);
  assert!(matches!(
    container.cache_value(6_i32),
    Err(Error::DuplicateCacheKey { .. })
  ));
}

// --- Shared instances and traits ---

#[test]
fn test_shared_instances_are_not_copied() {
  let mut container = DependencyContainer::new();
  let instance = Arc::new(String::from("shared"));
  container
    .cache_with_info(instance.clone(), CacheInfo::named("greeting"))
    .unwrap();

  let resolved = container
    .get::<String>(Some(&CacheInfo::named("greeting")))
    .unwrap();
  assert!(Arc::ptr_eq(&instance, &resolved));
}

#[test]
fn test_cache_as_keys_by_the_trait() {
  let mut container = DependencyContainer::new();
  container
    .cache_as::<dyn Greeter>(Arc::new(EnglishGreeter))
    .unwrap();
  container
    .cache_as_with_info::<dyn Greeter>(Arc::new(EnglishGreeter), CacheInfo::named("formal"))
    .unwrap();

  assert_eq!(container.get::<dyn Greeter>(None).unwrap().greet(), "Hello!");
  assert!(container
    .get::<dyn Greeter>(Some(&CacheInfo::named("formal")))
    .is_some());
  // Cached as the trait only; the concrete type has no slot.
  assert!(container.get::<EnglishGreeter>(None).is_none());
}

#[test]
fn test_kind_mismatch_is_not_misread() {
  let mut container = DependencyContainer::new();
  container.cache(Arc::new(7_i64)).unwrap();

  assert_eq!(container.get_optional_value::<i64>(None), None);
  assert!(matches!(
    container.try_get_optional_value::<i64>(None),
    Err(Error::SlotMismatch { .. })
  ));
  assert_eq!(*container.try_get::<i64>(None).unwrap().unwrap(), 7);
}
