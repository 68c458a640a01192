//! `engine.pool`: named free-lists of reusable objects shared by every Pool.

use engine_class::{ClassError, Instance, Properties, Value};
use engine_modules::ModuleSystem;

use super::EngineContext;

pub(super) fn pool(_: &mut ModuleSystem, ctx: &EngineContext) -> anyhow::Result<()> {
    ctx.classes.extend(
        "Class",
        "Pool",
        Properties::new()
            .shared_field("pools", Value::empty_map())
            .method("create", |this, args| {
                let name = pool_name(this, "create", args)?;
                let created = this.update("pools", |pools| {
                    let map = pools.as_map_mut()?;
                    if map.contains_key(&name) {
                        return Some(false);
                    }
                    map.insert(name, Value::list([]));
                    Some(true)
                })?;
                Ok(Value::Bool(created.unwrap_or(false)))
            })
            .method("put", |this, args| {
                let name = pool_name(this, "put", args)?;
                let object = args.get(1).cloned().unwrap_or_default();
                let stored = this.update("pools", |pools| {
                    let list = pools.as_map_mut()?.get_mut(&name)?.as_list_mut()?;
                    list.push(object);
                    Some(())
                })?;
                Ok(Value::Bool(stored.is_some()))
            })
            .method("get", |this, args| {
                let name = pool_name(this, "get", args)?;
                let object = this.update("pools", |pools| {
                    pools.as_map_mut()?.get_mut(&name)?.as_list_mut()?.pop()
                })?;
                Ok(object.unwrap_or_default())
            }),
    )?;
    Ok(())
}

fn pool_name(this: &Instance, method: &str, args: &[Value]) -> Result<String, ClassError> {
    let name = args
        .first()
        .ok_or_else(|| this.fail(method, "missing pool name"))?;
    Ok(name.expect_str()?.to_string())
}
