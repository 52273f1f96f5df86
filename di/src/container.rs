//! The hierarchical `DependencyContainer`.

use crate::activator;
use crate::error::{Error, Result};
use crate::key::{CacheInfo, CacheKey, TypeTag};
use crate::plan::{mismatch, ActivationPlan, Injectable};
use crate::registry::{global_plans, ActivationPlanProvider};
use crate::slot::{ensure_not_optional, Slot, SlotKind, SlotStore};
use std::any::Any;
use std::sync::Arc;
use tracing::{trace, warn};

/// A container of cached values with an optional parent.
///
/// Lookups check this container's own slots first and then walk up the parent
/// chain, so a child shadows any parent entry with the same key without
/// touching the parent.
///
/// Writing requires `&mut self`: a container is populated once and then shared
/// (typically as `Arc<DependencyContainer>`) for concurrent reads. Cached
/// values are referenced, not owned for disposal; dropping the container only
/// drops its handles.
pub struct DependencyContainer {
  parent: Option<Arc<DependencyContainer>>,
  store: SlotStore,
  plans: Arc<dyn ActivationPlanProvider>,
}

impl Default for DependencyContainer {
  fn default() -> Self {
    Self::new()
  }
}

impl DependencyContainer {
  /// Creates an empty root container backed by the global plan registry.
  pub fn new() -> Self {
    Self::with_provider(global_plans())
  }

  /// Creates an empty root container that takes activation plans from `plans`.
  pub fn with_provider(plans: Arc<dyn ActivationPlanProvider>) -> Self {
    Self {
      parent: None,
      store: SlotStore::default(),
      plans,
    }
  }

  /// Creates an empty child of `parent`, sharing its plan provider.
  pub fn with_parent(parent: Arc<DependencyContainer>) -> Self {
    Self {
      plans: parent.plans.clone(),
      parent: Some(parent),
      store: SlotStore::default(),
    }
  }

  pub fn parent(&self) -> Option<&Arc<DependencyContainer>> {
    self.parent.as_ref()
  }

  /// Number of slots owned by this container, excluding its parents.
  pub fn len(&self) -> usize {
    self.store.len()
  }

  pub fn is_empty(&self) -> bool {
    self.store.len() == 0
  }

  /// Whether this container itself, ignoring parents, holds `key`.
  pub fn contains_local(&self, key: &CacheKey) -> bool {
    self.store.contains(key)
  }

  // --- PRIVATE HELPERS ---

  pub(crate) fn insert_slot(&mut self, key: CacheKey, slot: Slot) -> Result<()> {
    let kind = slot.kind();
    self.store.insert(key.clone(), slot)?;
    trace!(key = %key, %kind, "cached");
    Ok(())
  }

  fn cache_shared_internal<T: ?Sized + Any + Send + Sync>(
    &mut self,
    info: Option<CacheInfo>,
    instance: Arc<T>,
  ) -> Result<()> {
    let key = CacheKey::new(TypeTag::of::<T>(), info.unwrap_or_default());
    self.insert_slot(key, Slot::shared(instance))
  }

  fn cache_value_internal<V: Clone + Any + Send + Sync>(
    &mut self,
    info: Option<CacheInfo>,
    value: Option<V>,
  ) -> Result<()> {
    let key = CacheKey::new(TypeTag::of::<V>(), info.unwrap_or_default());
    self.insert_slot(key, Slot::value(value))
  }

  pub(crate) fn activation_plan<T: Injectable>(&self) -> Arc<ActivationPlan> {
    self
      .plans
      .activation_plan(TypeTag::of::<T>(), crate::plan::build_plan::<T>)
  }

  // --- PUBLIC API ---

  // --- Shared Caching ---
  /// Caches `instance` under its concrete type.
  pub fn cache<T: Any + Send + Sync>(&mut self, instance: Arc<T>) -> Result<()> {
    self.cache_shared_internal(None, instance)
  }
  pub fn cache_with_info<T: Any + Send + Sync>(
    &mut self,
    instance: Arc<T>,
    info: CacheInfo,
  ) -> Result<()> {
    self.cache_shared_internal(Some(info), instance)
  }

  /// Caches `instance` under `T`, usually a trait object the value implements.
  ///
  /// ```
  /// use fibre_di::DependencyContainer;
  /// use std::sync::Arc;
  ///
  /// trait Clock: Send + Sync {
  ///   fn now(&self) -> u64;
  /// }
  /// struct Fixed;
  /// impl Clock for Fixed {
  ///   fn now(&self) -> u64 { 42 }
  /// }
  ///
  /// let mut container = DependencyContainer::new();
  /// container.cache_as::<dyn Clock>(Arc::new(Fixed)).unwrap();
  /// assert_eq!(container.get::<dyn Clock>(None).unwrap().now(), 42);
  /// ```
  pub fn cache_as<T: ?Sized + Any + Send + Sync>(&mut self, instance: Arc<T>) -> Result<()> {
    self.cache_shared_internal(None, instance)
  }
  pub fn cache_as_with_info<T: ?Sized + Any + Send + Sync>(
    &mut self,
    instance: Arc<T>,
    info: CacheInfo,
  ) -> Result<()> {
    self.cache_shared_internal(Some(info), instance)
  }

  // --- Value Caching ---
  /// Caches a copyable value under `V`. `V` may not be an `Option`; use
  /// [`cache_optional_value`](Self::cache_optional_value) for nullable values.
  pub fn cache_value<V: Clone + Any + Send + Sync>(&mut self, value: V) -> Result<()> {
    ensure_not_optional::<V>(|| "a direct value".to_string())?;
    self.cache_value_internal(None, Some(value))
  }
  pub fn cache_value_with_info<V: Clone + Any + Send + Sync>(
    &mut self,
    value: V,
    info: CacheInfo,
  ) -> Result<()> {
    ensure_not_optional::<V>(|| "a direct value".to_string())?;
    self.cache_value_internal(Some(info), Some(value))
  }

  /// Caches a nullable value under `V`; `None` is stored as an absent value.
  pub fn cache_optional_value<V: Clone + Any + Send + Sync>(
    &mut self,
    value: Option<V>,
  ) -> Result<()> {
    self.cache_value_internal(None, value)
  }
  pub fn cache_optional_value_with_info<V: Clone + Any + Send + Sync>(
    &mut self,
    value: Option<V>,
    info: CacheInfo,
  ) -> Result<()> {
    self.cache_value_internal(Some(info), value)
  }

  // --- Resolution ---
  /// Finds the slot for `key` here or in the nearest ancestor that has one.
  pub fn lookup(&self, key: &CacheKey) -> Option<&Slot> {
    let mut current = self;
    loop {
      if let Some(slot) = current.store.get(key) {
        return Some(slot);
      }
      match &current.parent {
        Some(parent) => {
          trace!(key = %key, "not cached locally, trying parent container");
          current = parent.as_ref();
        }
        None => return None,
      }
    }
  }

  /// Resolves a shared instance, or `None` when nothing in the chain caches it.
  pub fn get<T: ?Sized + Any + Send + Sync>(&self, info: Option<&CacheInfo>) -> Option<Arc<T>> {
    self.try_get::<T>(info).unwrap_or_else(|err| {
      warn!(error = %err, "ignoring cached slot of another kind");
      None
    })
  }

  /// Resolves a value, or `V::default()` when nothing in the chain caches it.
  pub fn get_value<V: Clone + Default + Any + Send + Sync>(&self, info: Option<&CacheInfo>) -> V {
    self.get_optional_value::<V>(info).unwrap_or_default()
  }

  /// Resolves a nullable value; absent and explicitly empty values are both `None`.
  pub fn get_optional_value<V: Clone + Any + Send + Sync>(
    &self,
    info: Option<&CacheInfo>,
  ) -> Option<V> {
    self
      .try_get_optional_value::<V>(info)
      .unwrap_or_else(|err| {
        warn!(error = %err, "ignoring cached slot of another kind");
        None
      })
  }

  /// Like [`get`](Self::get), but reports a slot holding another kind or type.
  pub fn try_get<T: ?Sized + Any + Send + Sync>(
    &self,
    info: Option<&CacheInfo>,
  ) -> Result<Option<Arc<T>>> {
    let key = CacheKey::for_lookup::<T>(info);
    match self.lookup(&key) {
      None => Ok(None),
      Some(slot) => slot
        .downcast_shared::<T>()
        .map(Some)
        .ok_or_else(|| mismatch::<T>(&key, slot, SlotKind::Shared)),
    }
  }

  pub fn try_get_optional_value<V: Clone + Any + Send + Sync>(
    &self,
    info: Option<&CacheInfo>,
  ) -> Result<Option<V>> {
    let key = CacheKey::for_lookup::<V>(info);
    match self.lookup(&key) {
      None => Ok(None),
      Some(slot) => slot
        .downcast_value::<V>()
        .ok_or_else(|| mismatch::<V>(&key, slot, SlotKind::Value)),
    }
  }

  /// Resolves a shared instance that must exist. Backs the `resolve!` macro.
  pub fn require<T: ?Sized + Any + Send + Sync>(
    &self,
    info: Option<&CacheInfo>,
  ) -> Result<Arc<T>> {
    self.try_get::<T>(info)?.ok_or_else(|| Error::NotCached {
      key: CacheKey::for_lookup::<T>(info),
    })
  }

  // --- Activation ---
  /// Writes the dependencies declared by `target`'s plan and runs its load callbacks.
  ///
  /// Dependencies are written base level first, then callbacks run in the same
  /// order. The first failure aborts the call and leaves `target` partially
  /// injected. Since `target` is borrowed mutably, value types are written in
  /// place rather than into a copy.
  pub fn inject<T: Injectable>(&self, target: &mut T) -> Result<()> {
    let plan = self.activation_plan::<T>();
    activator::inject(self, &plan, target)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lookup_walks_every_ancestor() {
    let mut root = DependencyContainer::new();
    root.cache_value(7_u8).unwrap();
    let root = Arc::new(root);
    let child = Arc::new(DependencyContainer::with_parent(root.clone()));
    let grandchild = DependencyContainer::with_parent(child.clone());

    let slot = grandchild.lookup(&CacheKey::of::<u8>()).unwrap();
    assert_eq!(slot.downcast_value::<u8>(), Some(Some(7)));
    assert!(grandchild.is_empty());
    assert!(Arc::ptr_eq(grandchild.parent().unwrap(), &child));
  }

  #[test]
  fn mismatched_slot_is_reported_by_try_get() {
    let mut container = DependencyContainer::new();
    container.cache_value(String::from("value")).unwrap();

    assert!(container.get::<String>(None).is_none());
    let err = container.try_get::<String>(None).unwrap_err();
    assert!(matches!(err, Error::SlotMismatch { .. }));
  }
}
