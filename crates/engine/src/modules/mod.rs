//! The engine modules compiled into the host.
//!
//! Each module registers the blueprints of one engine subsystem in the shared
//! [`ClassRegistry`]. Rendering, audio and storage backends live outside the host;
//! the blueprints hold the state game code extends and instantiates. `engine.core`
//! requires all of them and defines `Game`, whose `start` method brings the
//! subsystems up.

use std::sync::Arc;

use engine_class::{ClassRegistry, Value};
use engine_modules::{BodyTable, BundledSource, ModuleSystem};
use parking_lot::Mutex;

mod game;
mod media;
mod pool;
mod preload;
mod system;

pub use game::default_settings;
pub use preload::Preload;

pub const ENGINE_CORE: &str = "engine.core";

/// State shared by every engine module body.
#[derive(Clone)]
pub struct EngineContext {
    pub classes: Arc<ClassRegistry>,
    /// Default settings merged with the config's `[settings]` table.
    pub settings: Arc<Value>,
    /// Assets queued by game modules, handed to the Loader by `Game.start`.
    pub preload: Arc<Mutex<Preload>>,
}

impl EngineContext {
    pub fn new(settings: Value) -> Self {
        Self {
            classes: Arc::new(ClassRegistry::with_root()),
            settings: Arc::new(settings),
            preload: Arc::new(Mutex::new(Preload::default())),
        }
    }

    pub fn add_asset(&self, path: impl Into<String>) {
        self.preload.lock().add_asset(path);
    }

    /// Queue a sound; `name` defaults to the path.
    pub fn add_sound(&self, path: impl Into<String>, name: Option<&str>) {
        self.preload.lock().add_sound(path, name);
    }

    /// Queue a music track; `name` defaults to the path.
    pub fn add_music(&self, path: impl Into<String>, name: Option<&str>) {
        self.preload.lock().add_music(path, name);
    }

    /// Setting at a dotted path such as `system.width`.
    pub fn setting(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(self.settings.as_ref(), |value, key| value.as_map()?.get(key))
    }
}

type ModuleFn = fn(&mut ModuleSystem, &EngineContext) -> anyhow::Result<()>;

struct EngineModule {
    name: &'static str,
    requires: &'static [&'static str],
    body: ModuleFn,
}

pub const ENGINE_VERSION: &str = "1.0.0";

const ENGINE_MODULES: &[EngineModule] = &[
    EngineModule {
        name: "engine.system",
        requires: &[],
        body: system::system,
    },
    EngineModule {
        name: "engine.loader",
        requires: &["engine.system"],
        body: system::loader,
    },
    EngineModule {
        name: "engine.storage",
        requires: &[],
        body: system::storage,
    },
    EngineModule {
        name: "engine.debug",
        requires: &["engine.system"],
        body: system::debug,
    },
    EngineModule {
        name: "engine.sound",
        requires: &[],
        body: media::sound,
    },
    EngineModule {
        name: "engine.renderer",
        requires: &[],
        body: media::renderer,
    },
    EngineModule {
        name: "engine.sprite",
        requires: &["engine.renderer"],
        body: media::sprite,
    },
    EngineModule {
        name: "engine.tween",
        requires: &[],
        body: media::tween,
    },
    EngineModule {
        name: "engine.pool",
        requires: &[],
        body: pool::pool,
    },
    EngineModule {
        name: ENGINE_CORE,
        requires: &[
            "engine.loader",
            "engine.system",
            "engine.sound",
            "engine.renderer",
            "engine.sprite",
            "engine.debug",
            "engine.storage",
            "engine.tween",
            "engine.pool",
        ],
        body: game::core,
    },
];

/// Source that declares each engine module when it is first required.
pub fn bundled_source(ctx: &EngineContext) -> BundledSource {
    let mut source = BundledSource::new();
    for module in ENGINE_MODULES {
        let ctx = ctx.clone();
        source.insert(module.name, move |system: &mut ModuleSystem| {
            let ctx = ctx.clone();
            let body = module.body;
            system
                .declare(module.name, Some(ENGINE_VERSION))?
                .requires(module.requires.iter().copied())
                .body(move |system| body(system, &ctx))?;
            Ok(())
        });
    }
    source
}

/// Bodies that module manifests may name: every engine module body, plus `empty` for
/// modules that only group requirements.
pub fn body_table(ctx: &EngineContext) -> BodyTable {
    let mut table = BodyTable::new().with_body("empty", |_| Ok(()));
    for module in ENGINE_MODULES {
        let ctx = ctx.clone();
        let body = module.body;
        table = table.with_body(module.name, move |system| body(system, &ctx));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_lookup_by_path() {
        let ctx = EngineContext::new(default_settings());

        assert_eq!(ctx.setting("system.orientation"), Some(&Value::from("landscape")));
        assert!(ctx.setting("system.missing").is_none());
        assert!(ctx.setting("system.orientation.deeper").is_none());
    }

    #[test]
    fn test_context_clones_share_preload() {
        let ctx = EngineContext::new(default_settings());
        let module_ctx = ctx.clone();

        module_ctx.add_asset("title.png");
        module_ctx.add_sound("jump.ogg", Some("jump"));
        module_ctx.add_music("theme.ogg", None);

        let preload = ctx.preload.lock();
        assert_eq!(preload.resources, vec!["title.png"]);
        assert_eq!(preload.sounds["jump"], "jump.ogg");
        assert_eq!(preload.music["theme.ogg"], "theme.ogg");
    }

    #[test]
    fn test_core_requires_every_other_module() {
        let core = ENGINE_MODULES
            .iter()
            .find(|module| module.name == ENGINE_CORE)
            .unwrap();

        assert_eq!(core.requires.len(), ENGINE_MODULES.len() - 1);
        for module in ENGINE_MODULES.iter().filter(|module| module.name != ENGINE_CORE) {
            assert!(core.requires.contains(&module.name), "{} not required", module.name);
        }
    }
}
