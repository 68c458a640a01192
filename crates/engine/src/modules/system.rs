//! `engine.system`, `engine.loader`, `engine.storage` and `engine.debug`.

use engine_class::{ClassError, Instance, Properties, Value};
use engine_modules::ModuleSystem;

use super::EngineContext;

pub(crate) fn int_arg(args: &[Value], index: usize) -> Option<i64> {
    args.get(index).and_then(Value::as_int)
}

pub(super) fn system(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    let orientation = ctx
        .setting("system.orientation")
        .cloned()
        .unwrap_or_else(|| Value::from("landscape"));
    let (default_width, default_height) =
        super::game::default_size(orientation.as_str().unwrap_or_default());
    let width = ctx
        .setting("system.width")
        .cloned()
        .unwrap_or(Value::Int(default_width));
    let height = ctx
        .setting("system.height")
        .cloned()
        .unwrap_or(Value::Int(default_height));

    ctx.classes.extend(
        "Class",
        "System",
        Properties::new()
            .shared_field("orientation", orientation)
            .field("width", width)
            .field("height", height)
            .field("paused", false)
            .init(|this, args| {
                if let Some(width) = int_arg(args, 0) {
                    this.set("width", width)?;
                }
                if let Some(height) = int_arg(args, 1) {
                    this.set("height", height)?;
                }
                Ok(())
            })
            .method("resize", |this, args| {
                let width = args.first().ok_or_else(|| this.fail("resize", "missing width"))?;
                let height = args.get(1).ok_or_else(|| this.fail("resize", "missing height"))?;
                this.set("width", width.expect_int()?)?;
                this.set("height", height.expect_int()?)?;
                Ok(Value::Null)
            })
            .method("pause", |this, _| {
                this.set("paused", true)?;
                Ok(Value::Null)
            })
            .method("resume", |this, _| {
                this.set("paused", false)?;
                Ok(Value::Null)
            }),
    )?;
    Ok(())
}

pub(super) fn loader(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Class",
        "Loader",
        Properties::new()
            .field("scene", Value::Null)
            .field("resources", Value::list([]))
            .field("audio_resources", Value::list([]))
            .field("loaded", 0)
            .init(|this, args| {
                if let Some(scene) = args.first() {
                    this.set("scene", scene.clone())?;
                }
                if let Some(resources) = args.get(1) {
                    this.set("resources", resources.clone())?;
                }
                if let Some(audio) = args.get(2) {
                    this.set("audio_resources", audio.clone())?;
                }
                Ok(())
            })
            .method("progress", |this, _| {
                let total = pending_count(this);
                let loaded = this.get("loaded").and_then(|v| v.as_int()).unwrap_or(0);
                if total == 0 {
                    return Ok(Value::Float(100.0));
                }
                Ok(Value::Float(loaded as f64 * 100.0 / total as f64))
            })
            .method("start", |this, _| {
                let count = pending_count(this) as i64;
                // Fetching the files is the asset backend's job; the loader only counts them.
                this.set("loaded", count)?;
                tracing::info!(
                    "Loader finished {} resource(s) for scene {:?}",
                    count,
                    this.get("scene").and_then(|s| s.as_str().map(str::to_string))
                );
                Ok(Value::Int(count))
            }),
    )?;
    Ok(())
}

/// Graphics and audio resources queued on a Loader.
fn pending_count(loader: &Instance) -> usize {
    ["resources", "audio_resources"]
        .into_iter()
        .filter_map(|field| loader.get(field))
        .map(|list| list.as_list().map(Vec::len).unwrap_or(0))
        .sum()
}

pub(super) fn storage(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Class",
        "Storage",
        Properties::new()
            .field("id", Value::Null)
            .shared_field("data", Value::empty_map())
            .init(|this, args| {
                if let Some(id) = args.first() {
                    this.set("id", id.clone())?;
                }
                Ok(())
            })
            .method("set", |this, args| {
                let key = storage_key(this.get("id"), args.first())?;
                let value = args.get(1).cloned().unwrap_or_default();
                this.update("data", |data| {
                    if let Some(map) = data.as_map_mut() {
                        map.insert(key, value);
                    }
                })?;
                Ok(Value::Null)
            })
            .method("get", |this, args| {
                let key = storage_key(this.get("id"), args.first())?;
                Ok(this
                    .get("data")
                    .and_then(|data| data.as_map().and_then(|map| map.get(&key).cloned()))
                    .unwrap_or_default())
            }),
    )?;
    Ok(())
}

/// `<id>.<key>`, or the bare key when the storage has no id.
fn storage_key(id: Option<Value>, key: Option<&Value>) -> Result<String, ClassError> {
    let key = key
        .ok_or(ClassError::TypeMismatch {
            expected: "string",
            found: "null",
        })?
        .expect_str()?;
    Ok(match id.as_ref().and_then(Value::as_str) {
        Some(id) => format!("{}.{}", id, key),
        None => key.to_string(),
    })
}

pub(super) fn debug(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    let enabled = ctx
        .setting("debug.enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    ctx.classes.extend(
        "Class",
        "Debug",
        Properties::new()
            .shared_field("enabled", enabled)
            .field("frames", 0)
            .method("update", |this, _| {
                let frames = this.get("frames").and_then(|v| v.as_int()).unwrap_or(0) + 1;
                this.set("frames", frames)?;
                Ok(Value::Int(frames))
            }),
    )?;

    // Trace every resize on top of whatever System does.
    ctx.classes.inject(
        "System",
        Properties::new().override_method("resize", |this, parent, args| {
            tracing::debug!(
                "{} resize requested: {:?}",
                this.class_name(),
                args.iter().filter_map(engine_class::Value::as_int).collect::<Vec<_>>()
            );
            parent.call(args)
        }),
    )?;
    Ok(())
}
