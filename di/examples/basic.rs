use fibre_di::{CacheInfo, DependencyContainer};
use std::sync::Arc;

trait Greeter: Send + Sync {
  fn greet(&self) -> String;
}

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
  fn greet(&self) -> String {
    "Hello!".to_string()
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct WindowSize {
  width: u32,
  height: u32,
}

fn main() -> Result<(), fibre_di::Error> {
  let mut container = DependencyContainer::new();

  // Shared instances: every read hands out the same Arc.
  container.cache(Arc::new(String::from("fibre")))?;
  container.cache_as::<dyn Greeter>(Arc::new(EnglishGreeter))?;

  // Values: every read is a copy.
  container.cache_value(WindowSize {
    width: 1280,
    height: 720,
  })?;
  container.cache_value_with_info(60_u32, CacheInfo::named("fps"))?;

  let name = container.get::<String>(None).unwrap_or_default();
  let greeter = container.get::<dyn Greeter>(None);
  let size = container.get_value::<WindowSize>(None);
  let fps = container.get_value::<u32>(Some(&CacheInfo::named("fps")));

  println!("{} says {:?}", name, greeter.map(|g| g.greet()));
  println!("window {}x{} at {} fps", size.width, size.height, fps);

  // A second write of the same key is rejected.
  if let Err(err) = container.cache_value_with_info(30_u32, CacheInfo::named("fps")) {
    println!("rejected: {err}");
  }

  // Absent values resolve to nothing rather than failing.
  assert!(container.get::<Vec<u8>>(None).is_none());
  assert_eq!(container.get_value::<u64>(None), 0);
  Ok(())
}
