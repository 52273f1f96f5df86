use crate::key::CacheKey;
use crate::plan::Visibility;
use thiserror::Error;

/// The error type for cache writes, injection and merging.
///
/// All of these describe mistakes in how dependencies are wired together,
/// so nothing in the crate retries or recovers from them.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{key} is already cached in this container")]
  DuplicateCacheKey { key: CacheKey },

  /// `subject` names what was being cached: a declared member or a direct write.
  #[error("cannot cache {subject} as `{target}`: {reason}")]
  InvalidCacheTarget {
    subject: String,
    target: &'static str,
    reason: String,
  },

  #[error("cached member `{member}` of `{declaring_type}` has no value")]
  NullDependencyValue {
    member: &'static str,
    declaring_type: &'static str,
  },

  #[error("{key} required by `{member}` of `{declaring_type}` is not registered")]
  DependencyNotRegistered {
    key: CacheKey,
    member: &'static str,
    declaring_type: &'static str,
  },

  /// A direct lookup through `require` or `resolve!` found nothing.
  #[error("{key} is not cached in this container or its parents")]
  NotCached { key: CacheKey },

  #[error("`{member}` of `{declaring_type}` is {visibility}, but {rule}")]
  AccessModifierViolation {
    member: &'static str,
    declaring_type: &'static str,
    visibility: Visibility,
    rule: &'static str,
  },

  #[error("{key} holds a {found} slot, but {expected} was requested")]
  SlotMismatch {
    key: CacheKey,
    found: String,
    expected: String,
  },

  #[error("activation plan for `{plan}` was used with an instance of `{instance}`")]
  PlanTypeMismatch {
    plan: &'static str,
    instance: &'static str,
  },

  #[error("load callback `{loader}` read argument {index} as `{requested}`: {reason}")]
  InvalidLoadArgument {
    loader: &'static str,
    index: usize,
    requested: &'static str,
    reason: &'static str,
  },

  /// An error raised by a load callback itself.
  #[error("{0}")]
  Load(Box<dyn std::error::Error + Send + Sync>),
}

/// A specialized `Result` type for `fibre_di` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
