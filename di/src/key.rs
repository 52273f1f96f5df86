//! Keys identifying values stored in a container.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A semantic type identifier.
///
/// Equality and hashing only consider the `TypeId`; the name is carried for
/// diagnostics so errors can say which type was involved.
#[derive(Clone, Copy)]
pub struct TypeTag {
  id: TypeId,
  name: &'static str,
}

impl TypeTag {
  pub fn of<T: ?Sized + Any>() -> Self {
    Self {
      id: TypeId::of::<T>(),
      name: std::any::type_name::<T>(),
    }
  }

  pub fn id(&self) -> TypeId {
    self.id
  }

  pub fn name(&self) -> &'static str {
    self.name
  }
}

impl PartialEq for TypeTag {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl fmt::Debug for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "TypeTag({})", self.name)
  }
}

impl fmt::Display for TypeTag {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name)
  }
}

/// Optional qualifiers that distinguish values cached under the same type.
///
/// The default value has neither a name nor a parent type, which is not the
/// same as an empty name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CacheInfo {
  name: Option<String>,
  parent: Option<TypeTag>,
}

impl CacheInfo {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn named(name: impl Into<String>) -> Self {
    Self::default().with_name(name)
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Qualifies the key with the type that declares the cached member.
  pub fn with_parent<P: ?Sized + Any>(self) -> Self {
    self.with_parent_tag(TypeTag::of::<P>())
  }

  pub fn with_parent_tag(mut self, parent: TypeTag) -> Self {
    self.parent = Some(parent);
    self
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn parent(&self) -> Option<TypeTag> {
    self.parent
  }
}

/// The compound key of a slot: value type plus the optional qualifiers.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
  value_type: TypeTag,
  info: CacheInfo,
}

impl CacheKey {
  pub fn new(value_type: TypeTag, info: CacheInfo) -> Self {
    Self { value_type, info }
  }

  pub fn of<T: ?Sized + Any>() -> Self {
    Self::new(TypeTag::of::<T>(), CacheInfo::default())
  }

  pub(crate) fn for_lookup<T: ?Sized + Any>(info: Option<&CacheInfo>) -> Self {
    Self::new(TypeTag::of::<T>(), info.cloned().unwrap_or_default())
  }

  pub fn value_type(&self) -> TypeTag {
    self.value_type
  }

  pub fn info(&self) -> &CacheInfo {
    &self.info
  }

  pub fn name(&self) -> Option<&str> {
    self.info.name()
  }

  pub fn parent_type(&self) -> Option<TypeTag> {
    self.info.parent()
  }
}

impl fmt::Debug for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.name(), self.parent_type()) {
      (Some(name), Some(parent)) => write!(
        f,
        "Key(Type({}), Name({}), Parent({}))",
        self.value_type, name, parent
      ),
      (Some(name), None) => write!(f, "Key(Type({}), Name({}))", self.value_type, name),
      (None, Some(parent)) => write!(f, "Key(Type({}), Parent({}))", self.value_type, parent),
      (None, None) => write!(f, "Key(Type({}))", self.value_type),
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "`{}`", self.value_type)?;
    if let Some(name) = self.name() {
      write!(f, " named '{}'", name)?;
    }
    if let Some(parent) = self.parent_type() {
      write!(f, " declared by `{}`", parent)?;
    }
    Ok(())
  }
}
