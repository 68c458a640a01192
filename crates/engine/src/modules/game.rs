//! `engine.core`: the `Scene` and `Game` blueprints and the start sequence.

use std::sync::Arc;

use engine_class::{copy, merge, ClassError, Instance, Properties, Value};
use engine_modules::ModuleSystem;

use super::system::int_arg;
use super::{EngineContext, Preload};

/// Settings every engine starts from. The config's `[settings]` table is merged over
/// them.
pub fn default_settings() -> Value {
    Value::from(serde_json::json!({
        "system": {"orientation": "landscape"},
        "sound": {"volume": 1.0},
        "renderer": {"background": "#000000"},
        "debug": {"enabled": false},
        "storage": {"id": null},
        "loader": {"scene": "SceneTitle", "resources": []}
    }))
}

/// Canvas size used when neither the caller nor the settings give one.
pub(crate) fn default_size(orientation: &str) -> (i64, i64) {
    match orientation {
        "portrait" => (768, 927),
        _ => (1024, 671),
    }
}

pub(super) fn core(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Class",
        "Scene",
        Properties::new()
            .field("name", Value::Null)
            .init(|this, args| {
                if let Some(name) = args.first() {
                    this.set("name", name.clone())?;
                }
                Ok(())
            }),
    )?;

    // Weak, so the registry does not own a cycle through the Game blueprint.
    let classes = Arc::downgrade(&ctx.classes);
    let settings = ctx.settings.clone();
    let preload = ctx.preload.clone();
    ctx.classes.extend(
        "Class",
        "Game",
        Properties::new()
            .field("ready", false)
            .method("start", move |this, args| {
                let classes = classes
                    .upgrade()
                    .ok_or_else(|| this.fail("start", "class registry is gone"))?;
                let ctx = EngineContext {
                    classes,
                    settings: settings.clone(),
                    preload: preload.clone(),
                };
                start(&ctx, this, args)
            }),
    )?;
    Ok(())
}

/// `Game.start(scene?, width?, height?)`: bring up the subsystems, then run the loader.
fn start(ctx: &EngineContext, game: &Instance, args: &[Value]) -> Result<Value, ClassError> {
    let orientation = ctx
        .setting("system.orientation")
        .and_then(Value::as_str)
        .unwrap_or("landscape");
    let (default_width, default_height) = default_size(orientation);
    let width = int_arg(args, 1)
        .or_else(|| ctx.setting("system.width").and_then(Value::as_int))
        .unwrap_or(default_width);
    let height = int_arg(args, 2)
        .or_else(|| ctx.setting("system.height").and_then(Value::as_int))
        .unwrap_or(default_height);

    let system = ctx
        .classes
        .require("System")?
        .construct(&[Value::Int(width), Value::Int(height)])?;
    let preload = ctx.preload.lock().clone();

    game.set("system", system)?;
    let sound = ctx.classes.require("SoundManager")?.construct(&[])?;
    for (field, cache) in [("sounds", &preload.sounds), ("music", &preload.music)] {
        let registered = Preload::cache_value(cache);
        sound.update(field, |current| merge(current, &registered))?;
    }
    game.set("sound", sound)?;
    game.set("pool", ctx.classes.require("Pool")?.construct(&[])?)?;

    let debug_enabled = ctx
        .setting("debug.enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if debug_enabled {
        game.set("debug", ctx.classes.require("Debug")?.construct(&[])?)?;
    }
    if let Some(id) = ctx.setting("storage.id").filter(|id| !id.is_null()) {
        let storage = ctx.classes.require("Storage")?.construct(&[id.clone()])?;
        game.set("storage", storage)?;
    }

    game.set("ready", true)?;

    let scene = args
        .first()
        .cloned()
        .or_else(|| ctx.setting("loader.scene").cloned())
        .unwrap_or_default();
    let mut resources = ctx
        .setting("loader.resources")
        .map(copy)
        .unwrap_or_else(|| Value::list([]));
    if let Some(list) = resources.as_list_mut() {
        list.extend(preload.resources.iter().map(|path| Value::from(path.as_str())));
    }
    let loader = ctx
        .classes
        .require("Loader")?
        .construct(&[scene, resources, preload.audio_value()])?;
    let loaded = loader.call("start", &[])?;
    game.set("loader", loader)?;

    tracing::info!("Game started at {}x{} ({})", width, height, orientation);
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_size_follows_orientation() {
        assert_eq!(default_size("portrait"), (768, 927));
        assert_eq!(default_size("landscape"), (1024, 671));
        assert_eq!(default_size("sideways"), (1024, 671));
    }
}
