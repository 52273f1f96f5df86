use fibre_di::{
  global_plans, ActivationPlanProvider, CacheOptions, DependencyContainer, Injectable,
  PlanBuilder, PlanRegistry, ResolveOptions, TypeTag,
};
use std::sync::Arc;
use std::thread;

// --- Test Fixtures ---

#[derive(Default)]
struct Widget {
  label: Option<Arc<String>>,
}

impl Injectable for Widget {
  fn describe(plan: &mut PlanBuilder<'_, Self>) {
    plan
      .resolve::<String>("label", ResolveOptions::new(), |this, v| this.label = v)
      .cache::<String>("label", CacheOptions::new(), |this| this.label.clone());
  }
}

#[derive(Default)]
struct Panel {
  widget: Widget,
}

impl Injectable for Panel {
  fn describe(plan: &mut PlanBuilder<'_, Self>) {
    plan.extends::<Widget>(|p| &p.widget, |p| &mut p.widget);
  }
}

// --- Plan Tests ---

#[test]
fn test_plan_shape_is_stable() {
  let registry = PlanRegistry::new();

  let plan = registry.plan::<Panel>();
  assert_eq!(plan.type_tag(), TypeTag::of::<Panel>());
  assert_eq!(plan.levels().len(), 2);
  assert_eq!(plan.levels()[0].type_tag(), TypeTag::of::<Widget>());
  assert_eq!(plan.levels()[1].type_tag(), TypeTag::of::<Panel>());
  assert_eq!(plan.dependency_declarations().count(), 1);
  assert_eq!(plan.cache_declarations().count(), 1);
  assert_eq!(plan.loaders().count(), 0);

  let (level, declaration) = plan.dependency_declarations().next().unwrap();
  assert_eq!(level.type_tag(), TypeTag::of::<Widget>());
  assert_eq!(declaration.member(), "label");
  assert!(!declaration.permits_missing());
}

#[test]
fn test_concurrent_first_use_publishes_one_plan() {
  let registry = Arc::new(PlanRegistry::new());

  let plans: Vec<_> = thread::scope(|s| {
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let registry = registry.clone();
        s.spawn(move || registry.plan::<Panel>())
      })
      .collect();
    handles
      .into_iter()
      .map(|handle| handle.join().unwrap())
      .collect()
  });

  for plan in &plans {
    assert!(Arc::ptr_eq(plan, &plans[0]));
  }
  assert!(Arc::ptr_eq(&plans[0], &registry.plan::<Panel>()));
  assert_eq!(registry.len(), 2);
  assert!(registry.is_registered(TypeTag::of::<Widget>()));
}

#[test]
fn test_containers_share_their_provider_with_children() {
  let registry = Arc::new(PlanRegistry::new());
  let provider: Arc<dyn ActivationPlanProvider> = registry.clone();

  let mut root = DependencyContainer::with_provider(provider);
  root.cache(Arc::new(String::from("ok"))).unwrap();
  let child = DependencyContainer::with_parent(Arc::new(root));

  let mut panel = Panel::default();
  child.inject(&mut panel).unwrap();

  assert_eq!(panel.widget.label.unwrap().as_str(), "ok");
  assert!(registry.is_registered(TypeTag::of::<Panel>()));
  assert!(!global_plans().is_registered(TypeTag::of::<Panel>()));
}

#[test]
fn test_containers_are_shared_across_threads() {
  let mut root = DependencyContainer::new();
  root.cache(Arc::new(String::from("threaded"))).unwrap();
  let root = Arc::new(root);

  thread::scope(|s| {
    for _ in 0..4 {
      let root = root.clone();
      s.spawn(move || {
        let mut widget = Widget::default();
        root.inject(&mut widget).unwrap();
        assert_eq!(widget.label.unwrap().as_str(), "threaded");
      });
    }
  });
}
