//! Drives activation plans against containers: injection and merging.

use crate::container::DependencyContainer;
use crate::error::{Error, Result};
use crate::key::{CacheKey, TypeTag};
use crate::plan::{
  ActivationPlan, CacheDeclaration, Injectable, LoadArgs, PlanLevel, Requirement,
  Visibility,
};
use crate::slot::Slot;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

pub(crate) fn inject<T: Injectable>(
  container: &DependencyContainer,
  plan: &ActivationPlan,
  target: &mut T,
) -> Result<()> {
  ensure_plan_matches::<T>(plan)?;
  debug!(target_type = %plan.type_tag(), "injecting dependencies");
  let target: &mut dyn Any = target;

  for (level, declaration) in plan.dependency_declarations() {
    if declaration.setter() != Visibility::Private {
      return Err(Error::AccessModifierViolation {
        member: declaration.member(),
        declaring_type: level.type_tag().name(),
        visibility: declaration.setter(),
        rule: "an injected member must have a private setter",
      });
    }
    let slot = resolve(
      container,
      level,
      declaration.member(),
      declaration.requirement(),
      declaration.permits_missing(),
    )?;
    declaration.write(target, slot)?;
  }

  for (level, loader) in plan.loaders() {
    if loader.visibility() != Visibility::Private {
      return Err(Error::AccessModifierViolation {
        member: loader.name(),
        declaring_type: level.type_tag().name(),
        visibility: loader.visibility(),
        rule: "a load callback must be private",
      });
    }
    let slots = loader
      .parameters()
      .iter()
      .map(|requirement| {
        resolve(
          container,
          level,
          loader.name(),
          requirement,
          loader.permits_missing(),
        )
      })
      .collect::<Result<Vec<_>>>()?;

    trace!(loader = loader.name(), declared_by = %level.type_tag(), "running load callback");
    let mut args = LoadArgs::new(loader.name(), loader.parameters(), &slots);
    loader.invoke(target, &mut args).map_err(|err| match err.downcast::<Error>() {
      Ok(err) => *err,
      Err(other) => Error::Load(other),
    })?;
  }

  Ok(())
}

/// Looks a requirement up in the chain. `Ok(None)` means the declaration may
/// receive its default.
fn resolve<'c>(
  container: &'c DependencyContainer,
  level: &PlanLevel,
  member: &'static str,
  requirement: &Requirement,
  permit_missing: bool,
) -> Result<Option<&'c Slot>> {
  let key = requirement.key();
  let slot = container.lookup(key).filter(|slot| slot.has_value());

  match slot {
    Some(slot) if slot.kind() != requirement.kind() || slot.type_tag() != key.value_type() => {
      Err(Error::SlotMismatch {
        key: key.clone(),
        found: slot.describe(),
        expected: format!("{} `{}`", requirement.kind(), key.value_type()),
      })
    }
    Some(slot) => Ok(Some(slot)),
    None if requirement.is_nullable() || permit_missing => {
      trace!(key = %key, member, "dependency missing, using default");
      Ok(None)
    }
    None => Err(Error::DependencyNotRegistered {
      key: key.clone(),
      member,
      declaring_type: level.type_tag().name(),
    }),
  }
}

fn ensure_plan_matches<T: Any>(plan: &ActivationPlan) -> Result<()> {
  if plan.type_tag() != TypeTag::of::<T>() {
    return Err(Error::PlanTypeMismatch {
      plan: plan.type_tag().name(),
      instance: std::any::type_name::<T>(),
    });
  }
  Ok(())
}

/// Creates a child of `parent` holding everything `instance` declares as cached.
///
/// Declarations are walked from the concrete type down to its most-base type.
/// A key already published by a more-derived level is skipped at base levels;
/// the same key declared twice at one level is a `DuplicateCacheKey` error.
/// `parent` itself is never written to.
///
/// ```
/// use fibre_di::{merge_dependencies, CacheOptions, DependencyContainer, Injectable, PlanBuilder};
/// use std::sync::Arc;
///
/// struct Settings {
///   volume: u8,
/// }
///
/// impl Injectable for Settings {
///   fn describe(plan: &mut PlanBuilder<'_, Self>) {
///     plan.cache_value("volume", CacheOptions::new(), |this| this.volume);
///   }
/// }
///
/// let root = Arc::new(DependencyContainer::new());
/// let child = merge_dependencies(&Arc::new(Settings { volume: 80 }), root.clone()).unwrap();
///
/// assert_eq!(child.get_value::<u8>(None), 80);
/// assert_eq!(root.get_value::<u8>(None), 0);
/// ```
pub fn merge_dependencies<T: Injectable>(
  instance: &Arc<T>,
  parent: Arc<DependencyContainer>,
) -> Result<DependencyContainer> {
  let plan = parent.activation_plan::<T>();
  ensure_plan_matches::<T>(&plan)?;

  let mut child = DependencyContainer::with_parent(parent);
  let mut published: HashSet<CacheKey> = HashSet::new();

  for (depth, level) in plan.levels().iter().rev().enumerate() {
    let mut claimed = Vec::new();

    // Caching the instance itself belongs to the concrete type.
    if depth == 0 {
      for declaration in plan.instance_cached() {
        let key = declaration.key(plan.type_tag());
        let erased: Arc<dyn Any + Send + Sync> = instance.clone();
        let slot = declaration
          .read(erased)?
          .ok_or(Error::NullDependencyValue {
            member: "self",
            declaring_type: plan.type_tag().name(),
          })?;
        child.insert_slot(key.clone(), slot)?;
        claimed.push(key);
      }
    }

    for declaration in level.cached() {
      let key = declaration.key(level.type_tag());
      if published.contains(&key) {
        trace!(key = %key, member = declaration.member(), "overridden by a derived declaration");
        continue;
      }
      let slot = read_cached(level, declaration, &**instance)?;
      child.insert_slot(key.clone(), slot)?;
      claimed.push(key);
    }

    published.extend(claimed);
  }

  debug!(
    instance_type = %plan.type_tag(),
    cached = child.len(),
    "merged cache declarations into child container"
  );
  Ok(child)
}

fn read_cached(
  level: &PlanLevel,
  declaration: &CacheDeclaration,
  instance: &dyn Any,
) -> Result<Slot> {
  if declaration.visibility() != Visibility::Private && declaration.is_writable() {
    return Err(Error::AccessModifierViolation {
      member: declaration.member(),
      declaring_type: level.type_tag().name(),
      visibility: declaration.visibility(),
      rule: "a cached member must be private or read-only",
    });
  }

  let slot = declaration
    .read(instance)?
    .ok_or(Error::NullDependencyValue {
      member: declaration.member(),
      declaring_type: level.type_tag().name(),
    })?;

  if slot.kind() != declaration.kind() || slot.type_tag() != declaration.value_type() {
    return Err(Error::InvalidCacheTarget {
      subject: format!("`{}` of `{}`", declaration.member(), level.type_tag()),
      target: declaration.value_type().name(),
      reason: format!("the member yields a {}", slot.describe()),
    });
  }
  Ok(slot)
}
