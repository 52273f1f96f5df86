use fibre_di::{
  merge_dependencies, CacheOptions, DependencyContainer, Injectable, LoaderOptions, PlanBuilder,
  ResolveOptions,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

trait AudioManager: Send + Sync {
  fn play(&self, sample: &str) -> String;
}

struct Mixer {
  volume: u8,
}

impl AudioManager for Mixer {
  fn play(&self, sample: &str) -> String {
    format!("playing {sample} at {}%", self.volume)
  }
}

// The game publishes its audio manager and a ruleset name to everything below it.
struct Game {
  audio: Arc<Mixer>,
  ruleset: String,
}

impl Injectable for Game {
  fn describe(plan: &mut PlanBuilder<'_, Self>) {
    plan
      .cache::<dyn AudioManager>("audio", CacheOptions::new(), |this| {
        Some(this.audio.clone() as Arc<dyn AudioManager>)
      })
      .cache_value("ruleset", CacheOptions::new().named("ruleset"), |this| {
        this.ruleset.clone()
      });
  }
}

#[derive(Default)]
struct Drawable {
  audio: Option<Arc<dyn AudioManager>>,
}

impl Injectable for Drawable {
  fn describe(plan: &mut PlanBuilder<'_, Self>) {
    plan.resolve::<dyn AudioManager>("audio", ResolveOptions::new(), |this, audio| {
      this.audio = audio
    });
  }
}

// Extends `Drawable` and runs a load callback once its members are set.
#[derive(Default)]
struct HitCircle {
  drawable: Drawable,
  ruleset: String,
  status: String,
}

impl Injectable for HitCircle {
  fn describe(plan: &mut PlanBuilder<'_, Self>) {
    plan
      .extends::<Drawable>(|c| &c.drawable, |c| &mut c.drawable)
      .resolve_value::<String>(
        "ruleset",
        ResolveOptions::new().named("ruleset"),
        |this, ruleset| this.ruleset = ruleset,
      )
      .load(LoaderOptions::new("load").value_param::<u32>(), |this, args| {
        let combo = args.value::<u32>()?;
        if let Some(audio) = &this.drawable.audio {
          this.status = format!("{} (combo {combo})", audio.play("hitnormal"));
        }
        Ok(())
      });
  }
}

fn main() -> Result<(), fibre_di::Error> {
  // RUST_LOG=fibre_di=trace shows every write, fallback and plan build.
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let mut root = DependencyContainer::new();
  root.cache_value(12_u32)?;
  let root = Arc::new(root);

  let game = Arc::new(Game {
    audio: Arc::new(Mixer { volume: 80 }),
    ruleset: "osu".to_string(),
  });
  let game_scope = Arc::new(merge_dependencies(&game, root.clone())?);

  let mut circle = HitCircle::default();
  game_scope.inject(&mut circle)?;
  println!("[{}] {}", circle.ruleset, circle.status);

  // The root container knows nothing about the game's audio.
  let mut orphan = HitCircle::default();
  match root.inject(&mut orphan) {
    Ok(()) => println!("unexpectedly injected"),
    Err(err) => println!("root container: {err}"),
  }
  Ok(())
}
