//! # Engine Host
//!
//! Boots the engine: merges settings, bundles the `engine.*` modules, runs the module
//! bootstrap from the configured entry module and starts the game once `engine.core`
//! and the entry module have initialized.

use std::sync::Arc;

use anyhow::Context;
use engine_class::{merge, Instance};
use engine_modules::{BundledSource, ManifestSource, ModuleSystem};
use parking_lot::Mutex;

pub mod args;
pub mod config;
pub mod logging;
pub mod modules;

use config::EngineConfig;
use modules::{EngineContext, ENGINE_CORE};

/// Module declared by the host; runs last and starts the game.
pub const HOST_MODULE: &str = "host.main";

/// A booted engine.
pub struct Engine {
    modules: ModuleSystem,
    context: EngineContext,
    game: Arc<Mutex<Option<Instance>>>,
}

impl Engine {
    pub fn modules(&self) -> &ModuleSystem {
        &self.modules
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// The started `Game` instance.
    pub fn game(&self) -> Option<Instance> {
        self.game.lock().clone()
    }
}

/// Run the module bootstrap and start the game.
pub fn boot(config: &EngineConfig) -> anyhow::Result<Engine> {
    boot_with(config, |_, _| {})
}

/// Like [`boot`], with game modules bundled next to the engine ones.
///
/// `game_modules` receives the engine context, so module bodies can queue assets with
/// [`EngineContext::add_asset`] and friends before `Game.start` hands them to the
/// Loader.
pub fn boot_with(
    config: &EngineConfig,
    game_modules: impl FnOnce(&EngineContext, &mut BundledSource),
) -> anyhow::Result<Engine> {
    let mut settings = modules::default_settings();
    merge(&mut settings, &config.settings_value()?);
    let context = EngineContext::new(settings);

    let mut source = modules::bundled_source(&context);
    game_modules(&context, &mut source);
    if let Some(dir) = &config.manifest_dir {
        tracing::info!("Modules outside the engine are loaded from {}", dir.display());
        source = source.with_fallback(ManifestSource::new(dir, modules::body_table(&context)));
    }

    let mut system = ModuleSystem::new(config.loader.clone(), source);
    let game = Arc::new(Mutex::new(None));

    let mut requires = vec![config.entry_module.clone()];
    if config.entry_module != ENGINE_CORE {
        requires.push(ENGINE_CORE.to_string());
    }
    let classes = context.classes.clone();
    let slot = game.clone();
    system
        .declare(HOST_MODULE, None)?
        .requires(requires)
        .body(move |_| {
            let instance = classes.require("Game")?.construct(&[])?;
            instance.call("start", &[])?;
            *slot.lock() = Some(instance);
            Ok(())
        })?;

    system.run().context("Module bootstrap failed")?;

    Ok(Engine {
        modules: system,
        context,
        game,
    })
}
