//! Per-type activation plans.
//!
//! A plan lists what a type publishes when it is merged into a container
//! (cache declarations), what it receives when it is injected (dependency
//! declarations) and which load callbacks run afterwards. Plans are plain
//! data built once per type through [`PlanBuilder`]; nothing here inspects a
//! type at runtime.

use crate::error::{Error, Result};
use crate::key::{CacheInfo, CacheKey, TypeTag};
use crate::registry::ActivationPlanProvider;
use crate::slot::{ensure_not_optional, Slot, SlotKind};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// The result of a load callback. Any error is handed back to the caller of
/// `inject` as it was raised.
pub type LoadResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub type MemberReader = Arc<dyn Fn(&dyn Any) -> Result<Option<Slot>> + Send + Sync>;
pub type InstanceReader =
  Arc<dyn Fn(Arc<dyn Any + Send + Sync>) -> Result<Option<Slot>> + Send + Sync>;
pub type MemberWriter = Arc<dyn Fn(&mut dyn Any, Option<&Slot>) -> Result<()> + Send + Sync>;
pub type LoadInvoker = Arc<dyn Fn(&mut dyn Any, &mut LoadArgs<'_>) -> LoadResult + Send + Sync>;

/// Builds the plan of `T`. Used as the fallback a provider calls for types it
/// has not seen yet.
pub type PlanFactory = fn(&dyn ActivationPlanProvider) -> ActivationPlan;

/// A type whose instances can be injected into and merged into containers.
pub trait Injectable: Any + Send + Sync {
  /// Declares the cached members, resolved members and load callbacks of the type.
  fn describe(_plan: &mut PlanBuilder<'_, Self>)
  where
    Self: Sized,
  {
  }
}

pub fn build_plan<T: Injectable>(provider: &dyn ActivationPlanProvider) -> ActivationPlan {
  let mut builder = PlanBuilder::<T>::new(provider);
  T::describe(&mut builder);
  builder.build()
}

/// The declared visibility of the member behind a declaration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
  #[default]
  Private,
  /// Visible to a restricted scope: subtypes, the crate, or both.
  Restricted,
  Public,
}

impl fmt::Display for Visibility {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Visibility::Private => f.write_str("private"),
      Visibility::Restricted => f.write_str("restricted"),
      Visibility::Public => f.write_str("public"),
    }
  }
}

// --- Options ---

/// Options of a cached member or a cached instance.
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
  name: Option<String>,
  use_declaring_parent: bool,
  visibility: Visibility,
  writable: bool,
}

impl CacheOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Qualifies the key with the type that declares the member.
  pub fn with_declaring_parent(mut self) -> Self {
    self.use_declaring_parent = true;
    self
  }

  pub fn visibility(mut self, visibility: Visibility) -> Self {
    self.visibility = visibility;
    self
  }

  /// Marks the member as assignable after construction.
  pub fn writable(mut self) -> Self {
    self.writable = true;
    self
  }
}

/// Options of a resolved member.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
  info: CacheInfo,
  can_be_null: bool,
  setter: Visibility,
}

impl ResolveOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.info = self.info.with_name(name);
    self
  }

  pub fn with_parent<P: ?Sized + Any>(mut self) -> Self {
    self.info = self.info.with_parent::<P>();
    self
  }

  /// Write the default instead of failing when nothing is cached.
  pub fn can_be_null(mut self) -> Self {
    self.can_be_null = true;
    self
  }

  pub fn setter(mut self, visibility: Visibility) -> Self {
    self.setter = visibility;
    self
  }
}

/// A load callback's name, parameters and flags.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
  name: &'static str,
  parameters: Vec<Requirement>,
  permit_nulls: bool,
  visibility: Visibility,
}

impl LoaderOptions {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      parameters: Vec::new(),
      permit_nulls: false,
      visibility: Visibility::Private,
    }
  }

  pub fn param<D: ?Sized + Any + Send + Sync>(self) -> Self {
    self.with_parameter(Requirement::shared::<D>(CacheInfo::default(), false))
  }

  pub fn optional_param<D: ?Sized + Any + Send + Sync>(self) -> Self {
    self.with_parameter(Requirement::shared::<D>(CacheInfo::default(), true))
  }

  pub fn value_param<V: Any>(self) -> Self {
    self.with_parameter(Requirement::value::<V>(CacheInfo::default(), false))
  }

  pub fn optional_value_param<V: Any>(self) -> Self {
    self.with_parameter(Requirement::value::<V>(CacheInfo::default(), true))
  }

  pub fn with_parameter(mut self, requirement: Requirement) -> Self {
    self.parameters.push(requirement);
    self
  }

  /// Every parameter falls back to its default instead of failing.
  pub fn permit_nulls(mut self) -> Self {
    self.permit_nulls = true;
    self
  }

  pub fn visibility(mut self, visibility: Visibility) -> Self {
    self.visibility = visibility;
    self
  }
}

// --- Declarations ---

/// Something that must be looked up in a container.
#[derive(Debug, Clone)]
pub struct Requirement {
  key: CacheKey,
  kind: SlotKind,
  nullable: bool,
}

impl Requirement {
  pub fn shared<D: ?Sized + Any + Send + Sync>(info: CacheInfo, nullable: bool) -> Self {
    Self {
      key: CacheKey::new(TypeTag::of::<D>(), info),
      kind: SlotKind::Shared,
      nullable,
    }
  }

  /// A value requirement; the key type is `V` even when the member is `Option<V>`.
  pub fn value<V: Any>(info: CacheInfo, nullable: bool) -> Self {
    Self {
      key: CacheKey::new(TypeTag::of::<V>(), info),
      kind: SlotKind::Value,
      nullable,
    }
  }

  pub fn key(&self) -> &CacheKey {
    &self.key
  }

  pub fn kind(&self) -> SlotKind {
    self.kind
  }

  pub fn is_nullable(&self) -> bool {
    self.nullable
  }
}

/// A member published by `merge_dependencies`.
#[derive(Clone)]
pub struct CacheDeclaration {
  member: &'static str,
  value_type: TypeTag,
  kind: SlotKind,
  options: CacheOptions,
  read: MemberReader,
}

impl CacheDeclaration {
  /// Builds a declaration from an erased reader. The reader's slot must match
  /// `value_type` and `kind`, otherwise merging fails with `InvalidCacheTarget`.
  pub fn new(
    member: &'static str,
    value_type: TypeTag,
    kind: SlotKind,
    options: CacheOptions,
    read: MemberReader,
  ) -> Self {
    Self {
      member,
      value_type,
      kind,
      options,
      read,
    }
  }

  pub fn member(&self) -> &'static str {
    self.member
  }

  pub fn value_type(&self) -> TypeTag {
    self.value_type
  }

  pub fn kind(&self) -> SlotKind {
    self.kind
  }

  pub fn visibility(&self) -> Visibility {
    self.options.visibility
  }

  pub fn is_writable(&self) -> bool {
    self.options.writable
  }

  /// The key this declaration publishes under when declared by `declaring_type`.
  pub fn key(&self, declaring_type: TypeTag) -> CacheKey {
    cache_key(self.value_type, &self.options, declaring_type)
  }

  pub fn read(&self, instance: &dyn Any) -> Result<Option<Slot>> {
    (self.read)(instance)
  }
}

impl fmt::Debug for CacheDeclaration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheDeclaration")
      .field("member", &self.member)
      .field("value_type", &self.value_type)
      .field("kind", &self.kind)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

/// The instance itself published as its own type or as a trait object.
#[derive(Clone)]
pub struct InstanceCacheDeclaration {
  value_type: TypeTag,
  options: CacheOptions,
  read: InstanceReader,
}

impl InstanceCacheDeclaration {
  pub fn value_type(&self) -> TypeTag {
    self.value_type
  }

  pub fn key(&self, declaring_type: TypeTag) -> CacheKey {
    cache_key(self.value_type, &self.options, declaring_type)
  }

  pub fn read(&self, instance: Arc<dyn Any + Send + Sync>) -> Result<Option<Slot>> {
    (self.read)(instance)
  }
}

impl fmt::Debug for InstanceCacheDeclaration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InstanceCacheDeclaration")
      .field("value_type", &self.value_type)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

/// A member written by `inject`.
#[derive(Clone)]
pub struct DependencyDeclaration {
  member: &'static str,
  requirement: Requirement,
  permit_missing: bool,
  setter: Visibility,
  write: MemberWriter,
}

impl DependencyDeclaration {
  pub fn new(
    member: &'static str,
    requirement: Requirement,
    options: ResolveOptions,
    write: MemberWriter,
  ) -> Self {
    Self {
      member,
      requirement,
      permit_missing: options.can_be_null,
      setter: options.setter,
      write,
    }
  }

  pub fn member(&self) -> &'static str {
    self.member
  }

  pub fn requirement(&self) -> &Requirement {
    &self.requirement
  }

  pub fn permits_missing(&self) -> bool {
    self.permit_missing
  }

  pub fn setter(&self) -> Visibility {
    self.setter
  }

  pub fn write(&self, target: &mut dyn Any, slot: Option<&Slot>) -> Result<()> {
    (self.write)(target, slot)
  }
}

impl fmt::Debug for DependencyDeclaration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DependencyDeclaration")
      .field("member", &self.member)
      .field("requirement", &self.requirement)
      .field("permit_missing", &self.permit_missing)
      .field("setter", &self.setter)
      .finish_non_exhaustive()
  }
}

/// A callback invoked after every dependency of the instance has been written.
#[derive(Clone)]
pub struct LoaderDeclaration {
  options: LoaderOptions,
  invoke: LoadInvoker,
}

impl LoaderDeclaration {
  pub fn new(options: LoaderOptions, invoke: LoadInvoker) -> Self {
    Self { options, invoke }
  }

  pub fn name(&self) -> &'static str {
    self.options.name
  }

  pub fn parameters(&self) -> &[Requirement] {
    &self.options.parameters
  }

  pub fn permits_missing(&self) -> bool {
    self.options.permit_nulls
  }

  pub fn visibility(&self) -> Visibility {
    self.options.visibility
  }

  pub fn invoke(&self, target: &mut dyn Any, args: &mut LoadArgs<'_>) -> LoadResult {
    (self.invoke)(target, args)
  }
}

impl fmt::Debug for LoaderDeclaration {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoaderDeclaration")
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}

fn cache_key(value_type: TypeTag, options: &CacheOptions, declaring_type: TypeTag) -> CacheKey {
  let mut info = CacheInfo::default();
  if let Some(name) = &options.name {
    info = info.with_name(name.clone());
  }
  if options.use_declaring_parent {
    info = info.with_parent_tag(declaring_type);
  }
  CacheKey::new(value_type, info)
}

// --- Load arguments ---

/// The resolved parameters of one load callback, read in declaration order.
pub struct LoadArgs<'a> {
  loader: &'static str,
  parameters: &'a [Requirement],
  slots: &'a [Option<&'a Slot>],
  cursor: usize,
}

impl<'a> LoadArgs<'a> {
  pub fn new(
    loader: &'static str,
    parameters: &'a [Requirement],
    slots: &'a [Option<&'a Slot>],
  ) -> Self {
    Self {
      loader,
      parameters,
      slots,
      cursor: 0,
    }
  }

  pub fn remaining(&self) -> usize {
    self.parameters.len().saturating_sub(self.cursor)
  }

  /// The next shared parameter; `None` only when it was allowed to be missing.
  pub fn shared<D: ?Sized + Any + Send + Sync>(&mut self) -> Result<Option<Arc<D>>> {
    let (requirement, slot) = self.next::<D>(SlotKind::Shared)?;
    match slot {
      None => Ok(None),
      Some(slot) => slot
        .downcast_shared::<D>()
        .map(Some)
        .ok_or_else(|| mismatch::<D>(requirement.key(), slot, SlotKind::Shared)),
    }
  }

  pub fn value<V: Clone + Default + Any + Send + Sync>(&mut self) -> Result<V> {
    Ok(self.optional_value::<V>()?.unwrap_or_default())
  }

  pub fn optional_value<V: Clone + Any + Send + Sync>(&mut self) -> Result<Option<V>> {
    let (requirement, slot) = self.next::<V>(SlotKind::Value)?;
    match slot {
      None => Ok(None),
      Some(slot) => slot
        .downcast_value::<V>()
        .ok_or_else(|| mismatch::<V>(requirement.key(), slot, SlotKind::Value)),
    }
  }

  fn next<T: ?Sized + Any>(
    &mut self,
    kind: SlotKind,
  ) -> Result<(&'a Requirement, Option<&'a Slot>)> {
    let index = self.cursor;
    let loader = self.loader;
    let invalid = |reason| Error::InvalidLoadArgument {
      loader,
      index,
      requested: std::any::type_name::<T>(),
      reason,
    };
    let requirement = self
      .parameters
      .get(index)
      .ok_or_else(|| invalid("the callback declares fewer parameters"))?;
    if requirement.key().value_type() != TypeTag::of::<T>() || requirement.kind() != kind {
      return Err(invalid("the declared parameter has another type"));
    }
    let slot = self.slots.get(index).copied().flatten();
    self.cursor += 1;
    Ok((requirement, slot))
  }
}

pub(crate) fn mismatch<T: ?Sized + Any>(key: &CacheKey, slot: &Slot, kind: SlotKind) -> Error {
  Error::SlotMismatch {
    key: key.clone(),
    found: slot.describe(),
    expected: format!("{} `{}`", kind, std::any::type_name::<T>()),
  }
}

// --- Plans ---

/// The declarations contributed by one type of an inheritance chain.
#[derive(Debug, Clone)]
pub struct PlanLevel {
  type_tag: TypeTag,
  cached: Vec<CacheDeclaration>,
  dependencies: Vec<DependencyDeclaration>,
  loaders: Vec<LoaderDeclaration>,
}

impl PlanLevel {
  /// An empty level declared by `type_tag`.
  pub fn declared_by(type_tag: TypeTag) -> Self {
    Self {
      type_tag,
      cached: Vec::new(),
      dependencies: Vec::new(),
      loaders: Vec::new(),
    }
  }

  pub fn type_tag(&self) -> TypeTag {
    self.type_tag
  }

  pub fn cached(&self) -> &[CacheDeclaration] {
    &self.cached
  }

  pub fn dependencies(&self) -> &[DependencyDeclaration] {
    &self.dependencies
  }

  pub fn loaders(&self) -> &[LoaderDeclaration] {
    &self.loaders
  }

  pub fn push_cached(&mut self, declaration: CacheDeclaration) {
    self.cached.push(declaration);
  }

  pub fn push_dependency(&mut self, declaration: DependencyDeclaration) {
    self.dependencies.push(declaration);
  }

  pub fn push_loader(&mut self, declaration: LoaderDeclaration) {
    self.loaders.push(declaration);
  }

  /// Re-targets the accessors of a base level so they accept the derived type.
  fn lift<T: Any, B: Any>(&self, as_ref: fn(&T) -> &B, as_mut: fn(&mut T) -> &mut B) -> Self {
    let cached = self
      .cached
      .iter()
      .map(|declaration| {
        let read = declaration.read.clone();
        let lifted: MemberReader = Arc::new(move |target: &dyn Any| -> Result<Option<Slot>> {
          let target = downcast_target::<T>(target)?;
          read(as_ref(target) as &dyn Any)
        });
        CacheDeclaration {
          read: lifted,
          ..declaration.clone()
        }
      })
      .collect();

    let dependencies = self
      .dependencies
      .iter()
      .map(|declaration| {
        let write = declaration.write.clone();
        let lifted: MemberWriter =
          Arc::new(move |target: &mut dyn Any, slot: Option<&Slot>| -> Result<()> {
            let target = downcast_target_mut::<T>(target)?;
            write(as_mut(target) as &mut dyn Any, slot)
          });
        DependencyDeclaration {
          write: lifted,
          ..declaration.clone()
        }
      })
      .collect();

    let loaders = self
      .loaders
      .iter()
      .map(|declaration| {
        let invoke = declaration.invoke.clone();
        let lifted: LoadInvoker =
          Arc::new(move |target: &mut dyn Any, args: &mut LoadArgs<'_>| -> LoadResult {
            let target = downcast_target_mut::<T>(target)?;
            invoke(as_mut(target) as &mut dyn Any, args)
          });
        LoaderDeclaration {
          invoke: lifted,
          options: declaration.options.clone(),
        }
      })
      .collect();

    Self {
      type_tag: self.type_tag,
      cached,
      dependencies,
      loaders,
    }
  }
}

/// The complete activation plan of one concrete type.
#[derive(Debug, Clone)]
pub struct ActivationPlan {
  type_tag: TypeTag,
  instance_cached: Vec<InstanceCacheDeclaration>,
  levels: Vec<PlanLevel>,
}

impl ActivationPlan {
  /// A plan made of explicitly assembled levels, most-base first.
  pub fn from_levels(type_tag: TypeTag, levels: Vec<PlanLevel>) -> Self {
    Self {
      type_tag,
      instance_cached: Vec::new(),
      levels,
    }
  }

  pub fn type_tag(&self) -> TypeTag {
    self.type_tag
  }

  /// Levels ordered from the most-base type to the concrete type.
  pub fn levels(&self) -> &[PlanLevel] {
    &self.levels
  }

  pub fn instance_cached(&self) -> &[InstanceCacheDeclaration] {
    &self.instance_cached
  }

  /// Dependency declarations in injection order: base to derived, then declared order.
  pub fn dependency_declarations(
    &self,
  ) -> impl Iterator<Item = (&PlanLevel, &DependencyDeclaration)> {
    self
      .levels
      .iter()
      .flat_map(|level| level.dependencies.iter().map(move |d| (level, d)))
  }

  /// Cache declarations in merge order: derived to base.
  pub fn cache_declarations(&self) -> impl Iterator<Item = (&PlanLevel, &CacheDeclaration)> {
    self
      .levels
      .iter()
      .rev()
      .flat_map(|level| level.cached.iter().map(move |d| (level, d)))
  }

  pub fn loaders(&self) -> impl Iterator<Item = (&PlanLevel, &LoaderDeclaration)> {
    self
      .levels
      .iter()
      .flat_map(|level| level.loaders.iter().map(move |l| (level, l)))
  }
}

// --- Builder ---

/// Collects the declarations of `T`.
///
/// Accessors are ordinary closures over `T`; the builder erases them so the
/// container can drive them without knowing `T`.
pub struct PlanBuilder<'p, T> {
  provider: &'p dyn ActivationPlanProvider,
  inherited: Vec<PlanLevel>,
  level: PlanLevel,
  instance_cached: Vec<InstanceCacheDeclaration>,
  _marker: PhantomData<fn() -> T>,
}

impl<'p, T: Injectable> PlanBuilder<'p, T> {
  pub fn new(provider: &'p dyn ActivationPlanProvider) -> Self {
    Self {
      provider,
      inherited: Vec::new(),
      level: PlanLevel::declared_by(TypeTag::of::<T>()),
      instance_cached: Vec::new(),
      _marker: PhantomData,
    }
  }

  /// Inherits the plan of `B`, an embedded base reached through the projections.
  ///
  /// The base plan's levels run before the levels of `T`. Each call adds
  /// another base; bases run in the order they were added.
  pub fn extends<B: Injectable>(
    &mut self,
    as_ref: fn(&T) -> &B,
    as_mut: fn(&mut T) -> &mut B,
  ) -> &mut Self {
    let base = self
      .provider
      .activation_plan(TypeTag::of::<B>(), build_plan::<B>);
    self
      .inherited
      .extend(base.levels().iter().map(|level| level.lift(as_ref, as_mut)));
    self
  }

  /// Publishes a shared member. `M` is the key type; name a trait object to
  /// publish the member as that trait.
  pub fn cache<M: ?Sized + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: CacheOptions,
    read: impl Fn(&T) -> Option<Arc<M>> + Send + Sync + 'static,
  ) -> &mut Self {
    let reader: MemberReader = Arc::new(move |target: &dyn Any| -> Result<Option<Slot>> {
      let target = downcast_target::<T>(target)?;
      Ok(read(target).map(Slot::shared))
    });
    self.level.push_cached(CacheDeclaration::new(
      member,
      TypeTag::of::<M>(),
      SlotKind::Shared,
      options,
      reader,
    ));
    self
  }

  /// Publishes a value member under `V`. An `Option` member belongs in
  /// [`cache_optional_value`](Self::cache_optional_value); declaring one here
  /// makes merging fail with `InvalidCacheTarget`.
  pub fn cache_value<V: Clone + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: CacheOptions,
    read: impl Fn(&T) -> V + Send + Sync + 'static,
  ) -> &mut Self {
    let reader: MemberReader = Arc::new(move |target: &dyn Any| -> Result<Option<Slot>> {
      ensure_not_optional::<V>(|| format!("`{member}` of `{}`", std::any::type_name::<T>()))?;
      let target = downcast_target::<T>(target)?;
      Ok(Some(Slot::value(Some(read(target)))))
    });
    self.level.push_cached(CacheDeclaration::new(
      member,
      TypeTag::of::<V>(),
      SlotKind::Value,
      options,
      reader,
    ));
    self
  }

  /// Publishes a nullable value member; `None` is cached as an absent value.
  pub fn cache_optional_value<V: Clone + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: CacheOptions,
    read: impl Fn(&T) -> Option<V> + Send + Sync + 'static,
  ) -> &mut Self {
    let reader: MemberReader = Arc::new(move |target: &dyn Any| -> Result<Option<Slot>> {
      let target = downcast_target::<T>(target)?;
      Ok(Some(Slot::value(read(target))))
    });
    self.level.push_cached(CacheDeclaration::new(
      member,
      TypeTag::of::<V>(),
      SlotKind::Value,
      options,
      reader,
    ));
    self
  }

  /// Publishes the merged instance under its own type.
  pub fn cache_self(&mut self, options: CacheOptions) -> &mut Self {
    self.cache_self_as::<T>(options, |this| this)
  }

  /// Publishes the merged instance as `I`, typically a trait object it implements.
  pub fn cache_self_as<I: ?Sized + Any + Send + Sync>(
    &mut self,
    options: CacheOptions,
    convert: impl Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
  ) -> &mut Self {
    let read: InstanceReader =
      Arc::new(move |instance: Arc<dyn Any + Send + Sync>| -> Result<Option<Slot>> {
        let instance = instance.downcast::<T>().map_err(|_| Error::PlanTypeMismatch {
          plan: std::any::type_name::<T>(),
          instance: "another type",
        })?;
        Ok(Some(Slot::shared(convert(instance))))
      });
    self.instance_cached.push(InstanceCacheDeclaration {
      value_type: TypeTag::of::<I>(),
      options,
      read,
    });
    self
  }

  /// Receives a shared dependency. The writer sees `None` only when
  /// `options` permit a missing value.
  pub fn resolve<D: ?Sized + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    write: impl Fn(&mut T, Option<Arc<D>>) + Send + Sync + 'static,
  ) -> &mut Self {
    self.push_shared(member, options, false, write)
  }

  /// Receives a shared dependency that may be absent.
  pub fn resolve_optional<D: ?Sized + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    write: impl Fn(&mut T, Option<Arc<D>>) + Send + Sync + 'static,
  ) -> &mut Self {
    self.push_shared(member, options, true, write)
  }

  /// Receives a value dependency; a permitted miss writes `V::default()`.
  pub fn resolve_value<V: Clone + Default + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    write: impl Fn(&mut T, V) + Send + Sync + 'static,
  ) -> &mut Self {
    self.push_value::<V>(member, options, false, move |target, value| {
      write(target, value.unwrap_or_default())
    })
  }

  /// Receives a nullable value dependency.
  pub fn resolve_optional_value<V: Clone + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    write: impl Fn(&mut T, Option<V>) + Send + Sync + 'static,
  ) -> &mut Self {
    self.push_value::<V>(member, options, true, write)
  }

  /// Registers a load callback, run after all dependency declarations.
  pub fn load(
    &mut self,
    options: LoaderOptions,
    invoke: impl Fn(&mut T, &mut LoadArgs<'_>) -> LoadResult + Send + Sync + 'static,
  ) -> &mut Self {
    let invoker: LoadInvoker =
      Arc::new(move |target: &mut dyn Any, args: &mut LoadArgs<'_>| -> LoadResult {
        let target = downcast_target_mut::<T>(target)?;
        invoke(target, args)
      });
    self.level.push_loader(LoaderDeclaration::new(options, invoker));
    self
  }

  pub fn build(self) -> ActivationPlan {
    let mut levels = self.inherited;
    levels.push(self.level);
    ActivationPlan {
      type_tag: TypeTag::of::<T>(),
      instance_cached: self.instance_cached,
      levels,
    }
  }

  fn push_shared<D: ?Sized + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    nullable: bool,
    write: impl Fn(&mut T, Option<Arc<D>>) + Send + Sync + 'static,
  ) -> &mut Self {
    let requirement = Requirement::shared::<D>(options.info.clone(), nullable);
    let key = requirement.key().clone();
    let writer: MemberWriter =
      Arc::new(move |target: &mut dyn Any, slot: Option<&Slot>| -> Result<()> {
        let target = downcast_target_mut::<T>(target)?;
        let value = match slot {
          None => None,
          Some(slot) => Some(
            slot
              .downcast_shared::<D>()
              .ok_or_else(|| mismatch::<D>(&key, slot, SlotKind::Shared))?,
          ),
        };
        write(target, value);
        Ok(())
      });
    self
      .level
      .push_dependency(DependencyDeclaration::new(member, requirement, options, writer));
    self
  }

  fn push_value<V: Clone + Any + Send + Sync>(
    &mut self,
    member: &'static str,
    options: ResolveOptions,
    nullable: bool,
    write: impl Fn(&mut T, Option<V>) + Send + Sync + 'static,
  ) -> &mut Self {
    let requirement = Requirement::value::<V>(options.info.clone(), nullable);
    let key = requirement.key().clone();
    let writer: MemberWriter =
      Arc::new(move |target: &mut dyn Any, slot: Option<&Slot>| -> Result<()> {
        let target = downcast_target_mut::<T>(target)?;
        let value = match slot {
          None => None,
          Some(slot) => slot
            .downcast_value::<V>()
            .ok_or_else(|| mismatch::<V>(&key, slot, SlotKind::Value))?,
        };
        write(target, value);
        Ok(())
      });
    self
      .level
      .push_dependency(DependencyDeclaration::new(member, requirement, options, writer));
    self
  }
}

fn downcast_target<T: Any>(target: &dyn Any) -> Result<&T> {
  target.downcast_ref::<T>().ok_or(Error::PlanTypeMismatch {
    plan: std::any::type_name::<T>(),
    instance: "another type",
  })
}

fn downcast_target_mut<T: Any>(target: &mut dyn Any) -> Result<&mut T> {
  target.downcast_mut::<T>().ok_or(Error::PlanTypeMismatch {
    plan: std::any::type_name::<T>(),
    instance: "another type",
  })
}
