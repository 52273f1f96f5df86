//! Type-erased slots and the per-container store that owns them.

use crate::error::{Error, Result};
use crate::key::{CacheKey, TypeTag};
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// How a slot hands its value out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
  /// An `Arc<T>`; every read clones the handle, so all readers share one instance.
  Shared,
  /// An `Option<V>`; every read clones the value itself.
  Value,
}

impl fmt::Display for SlotKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SlotKind::Shared => f.write_str("shared"),
      SlotKind::Value => f.write_str("value"),
    }
  }
}

/// A single type-erased cached value.
///
/// The slot remembers the type it was created for, so reads can reject a
/// request for another type instead of misinterpreting the contents.
pub struct Slot {
  kind: SlotKind,
  type_tag: TypeTag,
  has_value: bool,
  value: Box<dyn Any + Send + Sync>,
}

impl Slot {
  pub fn shared<T: ?Sized + Any + Send + Sync>(instance: Arc<T>) -> Self {
    Self {
      kind: SlotKind::Shared,
      type_tag: TypeTag::of::<T>(),
      has_value: true,
      value: Box::new(instance),
    }
  }

  /// A value slot. `None` records an absent nullable value.
  pub fn value<V: Clone + Any + Send + Sync>(value: Option<V>) -> Self {
    Self {
      kind: SlotKind::Value,
      type_tag: TypeTag::of::<V>(),
      has_value: value.is_some(),
      value: Box::new(value),
    }
  }

  pub fn kind(&self) -> SlotKind {
    self.kind
  }

  pub fn type_tag(&self) -> TypeTag {
    self.type_tag
  }

  /// `false` only for a value slot holding `None`.
  pub fn has_value(&self) -> bool {
    self.has_value
  }

  pub fn downcast_shared<T: ?Sized + Any + Send + Sync>(&self) -> Option<Arc<T>> {
    if self.kind != SlotKind::Shared {
      return None;
    }
    self.value.downcast_ref::<Arc<T>>().cloned()
  }

  /// Returns `None` on a kind or type mismatch, `Some(None)` for an absent value.
  pub fn downcast_value<V: Clone + Any + Send + Sync>(&self) -> Option<Option<V>> {
    if self.kind != SlotKind::Value {
      return None;
    }
    self.value.downcast_ref::<Option<V>>().cloned()
  }

  pub(crate) fn describe(&self) -> String {
    format!("{} `{}`", self.kind, self.type_tag)
  }
}

impl fmt::Debug for Slot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Slot")
      .field("kind", &self.kind)
      .field("type", &self.type_tag)
      .field("has_value", &self.has_value)
      .finish_non_exhaustive()
  }
}

/// Rejects `Option<_>` as a plain value type. A nullable value is keyed by its
/// payload type, so it must go through the optional-value paths.
pub(crate) fn ensure_not_optional<V: Any>(subject: impl FnOnce() -> String) -> Result<()> {
  let target = std::any::type_name::<V>();
  if target.starts_with("core::option::Option<") {
    return Err(Error::InvalidCacheTarget {
      subject: subject(),
      target,
      reason: "nullable values are cached with the optional-value methods".to_string(),
    });
  }
  Ok(())
}

/// The slots owned by exactly one container.
///
/// Entries are append-only: writing an occupied key is an error rather than
/// an overwrite.
#[derive(Default)]
pub(crate) struct SlotStore {
  slots: HashMap<CacheKey, Slot>,
}

impl SlotStore {
  pub(crate) fn insert(&mut self, key: CacheKey, slot: Slot) -> Result<()> {
    match self.slots.entry(key) {
      Entry::Occupied(occupied) => Err(Error::DuplicateCacheKey {
        key: occupied.key().clone(),
      }),
      Entry::Vacant(vacant) => {
        vacant.insert(slot);
        Ok(())
      }
    }
  }

  pub(crate) fn get(&self, key: &CacheKey) -> Option<&Slot> {
    self.slots.get(key)
  }

  pub(crate) fn contains(&self, key: &CacheKey) -> bool {
    self.slots.contains_key(key)
  }

  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  trait Named: Send + Sync {
    fn name(&self) -> &str;
  }

  struct Fixed;
  impl Named for Fixed {
    fn name(&self) -> &str {
      "fixed"
    }
  }

  #[test]
  fn option_is_not_a_plain_value_type() {
    assert!(ensure_not_optional::<u32>(|| "a value".into()).is_ok());
    assert!(ensure_not_optional::<Vec<Option<u32>>>(|| "a value".into()).is_ok());

    let err = ensure_not_optional::<Option<u32>>(|| "a value".into()).unwrap_err();
    assert!(matches!(err, Error::InvalidCacheTarget { target, .. } if target.contains("u32")));
  }

  #[test]
  fn shared_slot_hands_out_the_same_instance() {
    let instance = Arc::new(String::from("shared"));
    let slot = Slot::shared(instance.clone());

    let read = slot.downcast_shared::<String>().unwrap();
    assert!(Arc::ptr_eq(&instance, &read));
    assert!(slot.downcast_value::<String>().is_none());
  }

  #[test]
  fn trait_object_slot_is_keyed_by_the_trait() {
    let slot = Slot::shared::<dyn Named>(Arc::new(Fixed));

    assert_eq!(slot.type_tag(), TypeTag::of::<dyn Named>());
    assert_eq!(slot.downcast_shared::<dyn Named>().unwrap().name(), "fixed");
    assert!(slot.downcast_shared::<Fixed>().is_none());
  }

  #[test]
  fn value_slot_tracks_absence() {
    let empty = Slot::value::<i32>(None);
    let full = Slot::value(Some(7_i32));

    assert!(!empty.has_value());
    assert_eq!(empty.downcast_value::<i32>(), Some(None));
    assert_eq!(full.downcast_value::<i32>(), Some(Some(7)));
    assert_eq!(full.downcast_value::<i64>(), None);
    assert!(full.downcast_shared::<i32>().is_none());
  }

  #[test]
  fn store_rejects_a_second_write() {
    let mut store = SlotStore::default();
    store.insert(CacheKey::of::<i32>(), Slot::value(Some(1))).unwrap();

    let err = store
      .insert(CacheKey::of::<i32>(), Slot::value(Some(2)))
      .unwrap_err();
    assert!(matches!(err, Error::DuplicateCacheKey { .. }));
    assert_eq!(
      store.get(&CacheKey::of::<i32>()).unwrap().downcast_value::<i32>(),
      Some(Some(1))
    );
    assert_eq!(store.len(), 1);
  }
}
