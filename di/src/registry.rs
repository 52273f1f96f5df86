//! Activation plan providers and the process-wide plan registry.

use crate::key::TypeTag;
use crate::plan::{build_plan, ActivationPlan, Injectable, PlanFactory};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use tracing::debug;

/// Supplies the activation plan of a type.
///
/// Implementations must return an equivalent plan every time they are asked
/// about the same type. `factory` builds the plan for a type the provider has
/// not seen; providers with a fixed table may ignore it.
pub trait ActivationPlanProvider: Send + Sync {
  fn activation_plan(&self, type_tag: TypeTag, factory: PlanFactory) -> Arc<ActivationPlan>;
}

/// A thread-safe provider that builds each plan lazily and keeps it for the
/// registry's lifetime.
#[derive(Default)]
pub struct PlanRegistry {
  plans: DashMap<TypeTag, Arc<ActivationPlan>>,
}

impl PlanRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the plan of `T`, building it on first use.
  pub fn plan<T: Injectable>(&self) -> Arc<ActivationPlan> {
    self.activation_plan(TypeTag::of::<T>(), build_plan::<T>)
  }

  pub fn is_registered(&self, type_tag: TypeTag) -> bool {
    self.plans.contains_key(&type_tag)
  }

  pub fn len(&self) -> usize {
    self.plans.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plans.is_empty()
  }
}

impl ActivationPlanProvider for PlanRegistry {
  fn activation_plan(&self, type_tag: TypeTag, factory: PlanFactory) -> Arc<ActivationPlan> {
    if let Some(plan) = self.plans.get(&type_tag) {
      return plan.value().clone();
    }

    // Built without holding a map guard: plans of base types are looked up
    // through this registry while the factory runs.
    let plan = Arc::new(factory(self));
    debug!(
      plan = %type_tag,
      levels = plan.levels().len(),
      "built activation plan"
    );

    // A racing thread may have published first; everyone returns the stored plan.
    let stored = self.plans.entry(type_tag).or_insert(plan);
    stored.value().clone()
  }
}

static GLOBAL_PLANS: Lazy<Arc<PlanRegistry>> = Lazy::new(|| Arc::new(PlanRegistry::new()));

/// The process-wide plan registry used by containers that were not given a
/// provider explicitly.
///
/// # Examples
///
/// ```
/// use fibre_di::{global_plans, Injectable};
///
/// struct Plain;
/// impl Injectable for Plain {}
///
/// let plan = global_plans().plan::<Plain>();
/// assert_eq!(plan.levels().len(), 1);
/// ```
pub fn global_plans() -> Arc<PlanRegistry> {
  GLOBAL_PLANS.clone()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::plan::{PlanBuilder, ResolveOptions};
  use std::sync::atomic::{AtomicUsize, Ordering};

  static BASE_BUILDS: AtomicUsize = AtomicUsize::new(0);

  #[derive(Default)]
  struct Base {
    value: Option<Arc<String>>,
  }

  impl Injectable for Base {
    fn describe(plan: &mut PlanBuilder<'_, Self>) {
      BASE_BUILDS.fetch_add(1, Ordering::SeqCst);
      plan.resolve::<String>("value", ResolveOptions::new(), |this, v| this.value = v);
    }
  }

  #[derive(Default)]
  struct Derived {
    base: Base,
  }

  impl Injectable for Derived {
    fn describe(plan: &mut PlanBuilder<'_, Self>) {
      plan.extends::<Base>(|d| &d.base, |d| &mut d.base);
    }
  }

  #[test]
  fn base_plans_are_built_once_and_reused() {
    let registry = PlanRegistry::new();

    let derived = registry.plan::<Derived>();
    let base = registry.plan::<Base>();
    let again = registry.plan::<Derived>();

    assert!(Arc::ptr_eq(&derived, &again));
    assert_eq!(derived.levels().len(), 2);
    assert_eq!(derived.levels()[0].type_tag(), base.type_tag());
    assert_eq!(registry.len(), 2);
    assert!(registry.is_registered(TypeTag::of::<Base>()));
    assert_eq!(BASE_BUILDS.load(Ordering::SeqCst), 1);
  }
}
