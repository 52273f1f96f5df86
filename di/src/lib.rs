//! # Fibre DI
//!
//! A hierarchical dependency container with per-type activation plans.
//!
//! Containers hold values keyed by type, an optional name and an optional
//! declaring type. A child container resolves from itself first and then from
//! its parents, so a child can shadow what an ancestor provides without
//! changing it.
//!
//! ## Core Concepts
//!
//! - **Container**: [`DependencyContainer`] owns its slots; shared values are
//!   cached as `Arc<T>` (including trait objects), plain values are copied out.
//! - **Activation plan**: a type implements [`Injectable`] to declare which
//!   members it publishes, which it receives and which load callbacks run
//!   after injection. Plans are built once per type and memoized.
//! - **Injection**: [`DependencyContainer::inject`] fills a value's declared
//!   dependencies from the container chain.
//! - **Merging**: [`merge_dependencies`] creates a child container holding
//!   what an instance declares as cached.
//!
//! ## Quick Start
//!
//! ```
//! use fibre_di::{
//!   merge_dependencies, CacheOptions, DependencyContainer, Injectable, PlanBuilder,
//!   ResolveOptions,
//! };
//! use std::sync::Arc;
//!
//! trait Storage: Send + Sync {
//!   fn path(&self) -> &str;
//! }
//!
//! struct DiskStorage;
//!
//! impl Storage for DiskStorage {
//!   fn path(&self) -> &str {
//!     "/var/lib/game"
//!   }
//! }
//!
//! // Publishes its storage to everything below it.
//! struct Game {
//!   storage: Arc<DiskStorage>,
//! }
//!
//! impl Injectable for Game {
//!   fn describe(plan: &mut PlanBuilder<'_, Self>) {
//!     plan.cache::<dyn Storage>("storage", CacheOptions::new(), |this| {
//!       Some(this.storage.clone() as Arc<dyn Storage>)
//!     });
//!   }
//! }
//!
//! #[derive(Default)]
//! struct Screen {
//!   storage: Option<Arc<dyn Storage>>,
//! }
//!
//! impl Injectable for Screen {
//!   fn describe(plan: &mut PlanBuilder<'_, Self>) {
//!     plan.resolve::<dyn Storage>("storage", ResolveOptions::new(), |this, storage| {
//!       this.storage = storage
//!     });
//!   }
//! }
//!
//! fn main() -> Result<(), fibre_di::Error> {
//!   let root = Arc::new(DependencyContainer::new());
//!   let game = Arc::new(Game { storage: Arc::new(DiskStorage) });
//!   let game_scope = merge_dependencies(&game, root)?;
//!
//!   let mut screen = Screen::default();
//!   game_scope.inject(&mut screen)?;
//!   assert_eq!(screen.storage.unwrap().path(), "/var/lib/game");
//!   Ok(())
//! }
//! ```

mod activator;
mod container;
mod error;
mod key;
mod macros;
mod plan;
mod registry;
mod slot;

// --- Public API ---
pub use activator::merge_dependencies;
pub use container::DependencyContainer;
pub use error::{Error, Result};
pub use key::{CacheInfo, CacheKey, TypeTag};
pub use plan::{
  build_plan, ActivationPlan, CacheDeclaration, CacheOptions, DependencyDeclaration, Injectable,
  InstanceCacheDeclaration, InstanceReader, LoadArgs, LoadInvoker, LoadResult, LoaderDeclaration,
  LoaderOptions, MemberReader, MemberWriter, PlanBuilder, PlanFactory, PlanLevel, Requirement,
  ResolveOptions, Visibility,
};
pub use registry::{global_plans, ActivationPlanProvider, PlanRegistry};
pub use slot::{Slot, SlotKind};
