//! `engine.sound`, `engine.renderer`, `engine.sprite` and `engine.tween`.
//!
//! Placeholders for the media subsystems: they hold state game code reads and
//! writes, and leave playback and drawing to the backends.

use engine_class::{Properties, Value};
use engine_modules::ModuleSystem;

use super::EngineContext;

pub(super) fn sound(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    let volume = ctx
        .setting("sound.volume")
        .and_then(Value::as_float)
        .unwrap_or(1.0);

    ctx.classes.extend(
        "Class",
        "SoundManager",
        Properties::new()
            .shared_field("sounds", Value::empty_map())
            .shared_field("music", Value::empty_map())
            .field("muted", false)
            .field("volume", volume)
            .method("register", |this, args| {
                let name = args
                    .first()
                    .ok_or_else(|| this.fail("register", "missing sound name"))?
                    .expect_str()?
                    .to_string();
                let path = args.get(1).cloned().unwrap_or_default();
                this.update("sounds", |sounds| {
                    if let Some(map) = sounds.as_map_mut() {
                        map.insert(name, path);
                    }
                })?;
                Ok(Value::Null)
            })
            .method("mute", |this, _| {
                this.set("muted", true)?;
                Ok(Value::Null)
            })
            .method("unmute", |this, _| {
                this.set("muted", false)?;
                Ok(Value::Null)
            })
            .method("set_volume", |this, args| {
                let volume = args
                    .first()
                    .ok_or_else(|| this.fail("set_volume", "missing volume"))?
                    .expect_float()?
                    .clamp(0.0, 1.0);
                this.set("volume", volume)?;
                Ok(Value::Float(volume))
            }),
    )?;
    Ok(())
}

pub(super) fn renderer(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    let background = ctx
        .setting("renderer.background")
        .cloned()
        .unwrap_or_else(|| Value::from("#000000"));

    ctx.classes.extend(
        "Class",
        "Container",
        Properties::new()
            .field("children", Value::list([]))
            .method("add_child", |this, args| {
                let child = args
                    .first()
                    .ok_or_else(|| this.fail("add_child", "missing child"))?
                    .expect_object()?
                    .clone();
                let count = this.update("children", |children| {
                    children.as_list_mut().map(|list| {
                        list.push(Value::Object(child));
                        list.len()
                    })
                })?;
                Ok(Value::Int(count.unwrap_or(0) as i64))
            })
            .method("child_count", |this, _| {
                let count = this
                    .get("children")
                    .and_then(|c| c.as_list().map(Vec::len))
                    .unwrap_or(0);
                Ok(Value::Int(count as i64))
            }),
    )?;

    ctx.classes.extend(
        "Class",
        "Renderer",
        Properties::new()
            .field("background", background)
            .field("frames", 0)
            .method("render", |this, args| {
                args.first()
                    .ok_or_else(|| this.fail("render", "missing stage"))?
                    .expect_object()?;
                let frames = this.get("frames").and_then(|v| v.as_int()).unwrap_or(0) + 1;
                this.set("frames", frames)?;
                Ok(Value::Int(frames))
            }),
    )?;
    Ok(())
}

pub(super) fn sprite(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Container",
        "Sprite",
        Properties::new()
            .field("texture", Value::Null)
            .field("position", Value::map([("x", Value::Int(0)), ("y", Value::Int(0))]))
            .field("anchor", Value::map([("x", Value::Float(0.0)), ("y", Value::Float(0.0))]))
            .init(|this, args| {
                if let Some(texture) = args.first() {
                    this.set("texture", texture.clone())?;
                }
                let x = args.get(1).cloned().unwrap_or(Value::Int(0));
                let y = args.get(2).cloned().unwrap_or(Value::Int(0));
                this.update("position", |position| {
                    if let Some(map) = position.as_map_mut() {
                        map.insert("x".into(), x);
                        map.insert("y".into(), y);
                    }
                })
            }),
    )?;
    Ok(())
}

pub(super) fn tween(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Class",
        "Tween",
        Properties::new()
            .field("from", 0.0)
            .field("to", 1.0)
            .field("duration", 1000.0)
            .init(|this, args| {
                for (index, field) in ["from", "to", "duration"].into_iter().enumerate() {
                    if let Some(value) = args.get(index) {
                        this.set(field, value.expect_float()?)?;
                    }
                }
                Ok(())
            })
            .method("value_at", |this, args| {
                let elapsed = args
                    .first()
                    .ok_or_else(|| this.fail("value_at", "missing elapsed time"))?
                    .expect_float()?;
                let from = this.get("from").unwrap_or_default().expect_float()?;
                let to = this.get("to").unwrap_or_default().expect_float()?;
                let duration = this.get("duration").unwrap_or_default().expect_float()?;
                let t = if duration <= 0.0 { 1.0 } else { (elapsed / duration).clamp(0.0, 1.0) };
                Ok(Value::Float(from + (to - from) * t))
            }),
    )?;
    Ok(())
}
