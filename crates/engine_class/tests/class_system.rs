use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use engine_class::{Blueprint, ClassError, ClassRegistry, Properties, Value};

fn shape() -> Blueprint {
    Blueprint::root().extend(
        "Shape",
        Properties::new()
            .field("name", "shape")
            .method("area", |_, _| Ok(Value::Int(0)))
            .method("label", |this, _| {
                Ok(this.get("name").unwrap_or_default())
            }),
    )
}

#[test]
fn test_extend_leaves_parent_untouched() {
    let base = shape();
    let square = base.extend(
        "Square",
        Properties::new()
            .field("side", 3)
            .method("area", |this, _| {
                let side = this.get("side").unwrap_or_default().expect_int()?;
                Ok(Value::Int(side * side))
            }),
    );

    let plain = base.construct(&[]).unwrap();
    let sq = square.construct(&[]).unwrap();

    assert_eq!(plain.call("area", &[]).unwrap(), Value::Int(0));
    assert_eq!(sq.call("area", &[]).unwrap(), Value::Int(9));
    assert_eq!(sq.call("label", &[]).unwrap(), Value::from("shape"));
    assert!(plain.get("side").is_none());
    assert_eq!(sq.get("side"), Some(Value::Int(3)));
    assert!(base.responds_to("label"));
    assert!(!base.responds_to("name"));
}

#[test]
fn test_three_level_parent_chain() {
    let a = Blueprint::root().extend(
        "A",
        Properties::new().method("trace", |_, _| Ok(Value::list([Value::from("A")]))),
    );
    let b = a.extend(
        "B",
        Properties::new().override_method("trace", |_, parent, args| {
            let mut seen = parent.call(args)?;
            if let Some(items) = seen.as_list_mut() {
                items.push(Value::from("B"));
            }
            Ok(seen)
        }),
    );
    let c = b.extend(
        "C",
        Properties::new().override_method("trace", |_, parent, args| {
            let mut seen = parent.call(args)?;
            if let Some(items) = seen.as_list_mut() {
                items.push(Value::from("C"));
            }
            Ok(seen)
        }),
    );

    let instance = c.construct(&[]).unwrap();
    assert_eq!(
        instance.call("trace", &[]).unwrap(),
        Value::list([Value::from("A"), Value::from("B"), Value::from("C")])
    );

    // Calling through a middle level only climbs from there.
    let middle = b.construct(&[]).unwrap();
    assert_eq!(
        middle.call("trace", &[]).unwrap(),
        Value::list([Value::from("A"), Value::from("B")])
    );
}

#[test]
fn test_parent_call_inside_recursion() {
    // B.countdown calls its parent, which calls back into the instance's most
    // derived countdown. Each frame must still resolve to its own parent.
    let a = Blueprint::root().extend(
        "A",
        Properties::new().method("countdown", |this, args| {
            let n = args[0].expect_int()?;
            if n == 0 {
                return Ok(Value::list([]));
            }
            let mut rest = this.call("countdown", &[Value::Int(n - 1)])?;
            if let Some(items) = rest.as_list_mut() {
                items.push(Value::from(format!("A{}", n)));
            }
            Ok(rest)
        }),
    );
    let b = a.extend(
        "B",
        Properties::new().override_method("countdown", |_, parent, args| {
            let mut inner = parent.call(args)?;
            if let Some(items) = inner.as_list_mut() {
                items.push(Value::from(format!("B{}", args[0].expect_int()?)));
            }
            Ok(inner)
        }),
    );

    let result = b
        .construct(&[])
        .unwrap()
        .call("countdown", &[Value::Int(2)])
        .unwrap();
    assert_eq!(
        result,
        Value::list([
            Value::from("B0"),
            Value::from("A1"),
            Value::from("B1"),
            Value::from("A2"),
            Value::from("B2"),
        ])
    );
}

#[test]
fn test_owned_composites_are_isolated_between_instances() {
    let inventory = Blueprint::root().extend(
        "Inventory",
        Properties::new()
            .field("items", Value::list([]))
            .field("slots", Value::map([("head", Value::Null)])),
    );

    let a = inventory.construct(&[]).unwrap();
    let b = inventory.construct(&[]).unwrap();

    a.update("items", |items| {
        if let Some(list) = items.as_list_mut() {
            list.push(Value::from("sword"));
        }
    })
    .unwrap();
    a.update("slots", |slots| {
        if let Some(map) = slots.as_map_mut() {
            map.insert("head".into(), Value::from("helmet"));
        }
    })
    .unwrap();

    assert_eq!(a.get("items"), Some(Value::list([Value::from("sword")])));
    assert_eq!(b.get("items"), Some(Value::list([])));
    assert_eq!(b.get("slots"), Some(Value::map([("head", Value::Null)])));
    assert_eq!(inventory.construct(&[]).unwrap().get("items"), Some(Value::list([])));
}

#[test]
fn test_shared_field_is_one_value() {
    let pool = Blueprint::root().extend(
        "Pool",
        Properties::new().shared_field("free", Value::list([])),
    );
    let a = pool.construct(&[]).unwrap();
    let b = pool.construct(&[]).unwrap();

    a.update("free", |free| {
        if let Some(list) = free.as_list_mut() {
            list.push(Value::Int(1));
        }
    })
    .unwrap();

    assert!(!a.has_own("free"));
    assert_eq!(b.get("free"), Some(Value::list([Value::Int(1)])));
}

#[test]
fn test_static_init_can_replace_instance() {
    let singleton =
        Blueprint::root().extend("Director", Properties::new().field("scene", "menu"));
    let existing = singleton.construct(&[]).unwrap();
    existing.set("scene", "level-1").unwrap();

    let shared = existing.clone();
    let init_runs = Arc::new(AtomicUsize::new(0));
    let runs = init_runs.clone();
    singleton.inject(
        Properties::new()
            .static_init(move |_, _| Ok(Some(shared.clone())))
            .init(move |_, _| {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );

    let again = singleton.construct(&[]).unwrap();
    assert!(again.ptr_eq(&existing));
    assert_eq!(again.get("scene"), Some(Value::from("level-1")));
    assert_eq!(init_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_static_init_returning_none_constructs_normally() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();
    let blueprint = Blueprint::root().extend(
        "Tracked",
        Properties::new()
            .static_init(move |_, _| {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .init(|this, _| {
                this.set("ready", true)
            }),
    );

    let child = blueprint.extend("TrackedChild", Properties::new());
    let instance = child.construct(&[]).unwrap();

    assert_eq!(instance.get("ready"), Some(Value::Bool(true)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(instance.class_name(), "TrackedChild");
}

#[test]
fn test_inject_reaches_existing_instances() {
    let base = shape();
    let instance = base.construct(&[]).unwrap();
    assert!(!instance.responds_to("perimeter"));

    base.inject(Properties::new().method("perimeter", |_, _| Ok(Value::Int(4))));

    assert_eq!(instance.call("perimeter", &[]).unwrap(), Value::Int(4));
}

#[test]
fn test_inject_override_wraps_previous_implementation() {
    let base = shape();
    base.inject(Properties::new().override_method("label", |_, parent, args| {
        let previous = parent.call(args)?;
        Ok(Value::from(format!("[{}]", previous.expect_str()?)))
    }));
    base.inject(Properties::new().override_method("label", |_, parent, args| {
        let previous = parent.call(args)?;
        Ok(Value::from(format!("<{}>", previous.expect_str()?)))
    }));

    let instance = base.construct(&[]).unwrap();
    assert_eq!(instance.call("label", &[]).unwrap(), Value::from("<[shape]>"));
}

#[test]
fn test_inject_into_parent_is_seen_by_child_parent_call() {
    let base = shape();
    let child = base.extend(
        "Circle",
        Properties::new().override_method("area", |_, parent, args| {
            let inherited = parent.call(args)?.expect_int()?;
            Ok(Value::Int(inherited + 1))
        }),
    );
    let circle = child.construct(&[]).unwrap();
    assert_eq!(circle.call("area", &[]).unwrap(), Value::Int(1));

    base.inject(Properties::new().method("area", |_, _| Ok(Value::Int(10))));

    assert_eq!(circle.call("area", &[]).unwrap(), Value::Int(11));
}

#[test]
fn test_inject_override_without_previous_reports_missing_parent() {
    let base = shape();
    base.inject(Properties::new().override_method("fly", |_, parent, args| parent.call(args)));

    let err = base.construct(&[]).unwrap().call("fly", &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Method 'fly' on class Shape has no parent implementation"
    );
}

#[test]
fn test_method_errors_propagate_through_parent_calls() {
    let base = Blueprint::root().extend(
        "Loader",
        Properties::new().method("load", |this, _| Err(this.fail("load", "missing file"))),
    );
    let child = base.extend(
        "RetryingLoader",
        Properties::new().override_method("load", |_, parent, args| parent.call(args)),
    );

    let err = child.construct(&[]).unwrap().call("load", &[]).unwrap_err();
    assert_eq!(
        err,
        ClassError::Method {
            class: "RetryingLoader".into(),
            method: "load".into(),
            message: "missing file".into(),
        }
    );
}

#[test]
fn test_registry_builds_hierarchy_by_name() {
    let registry = ClassRegistry::with_root();
    registry
        .extend(
            "Class",
            "Entity",
            Properties::new().field("pos", Value::list([Value::Int(0), Value::Int(0)])),
        )
        .unwrap();
    registry
        .extend("Entity", "Player", Properties::new().field("lives", 3))
        .unwrap();

    let player = registry.require("Player").unwrap();
    let entity = registry.require("Entity").unwrap();
    let hero = player.construct(&[]).unwrap();

    assert!(hero.is_instance_of(&entity));
    assert_eq!(hero.get("lives"), Some(Value::Int(3)));
    assert!(hero.has_own("pos"));
    assert!(matches!(
        registry.require("Enemy"),
        Err(ClassError::ClassNotFound(ref name)) if name == "Enemy"
    ));
}

fn push(this: &engine_class::Instance, name: &str, item: Value) -> Result<(), ClassError> {
    this.update(name, |value| {
        if let Some(list) = value.as_list_mut() {
            list.push(item);
        }
    })
}

#[test]
fn test_nested_update_of_shared_field_never_sees_placeholder() {
    let queue = Blueprint::root().extend(
        "Queue",
        Properties::new().shared_field("items", Value::list([])),
    );
    let a = queue.construct(&[]).unwrap();
    let b = queue.construct(&[]).unwrap();

    let mut seen = None;
    let mut nested = None;
    a.update("items", |items| {
        seen = b.get("items");
        nested = Some(push(&b, "items", Value::Int(99)));
        if let Some(list) = items.as_list_mut() {
            list.push(Value::Int(1));
        }
    })
    .unwrap();

    assert_eq!(seen, Some(Value::list([])));
    assert!(matches!(
        nested,
        Some(Err(ClassError::FieldBusy { ref class, ref field }))
            if class == "Queue" && field == "items"
    ));
    assert_eq!(b.get("items"), Some(Value::list([Value::Int(1)])));

    push(&b, "items", Value::Int(2)).unwrap();
    assert_eq!(a.get("items"), Some(Value::list([Value::Int(1), Value::Int(2)])));
}

#[test]
fn test_concurrent_updates_of_shared_field_are_not_lost() {
    let counter = Blueprint::root().extend(
        "Counter",
        Properties::new().shared_field("hits", Value::list([])),
    );

    std::thread::scope(|scope| {
        for worker in 0..8 {
            let instance = counter.construct(&[]).unwrap();
            scope.spawn(move || {
                for _ in 0..500 {
                    push(&instance, "hits", Value::Int(worker)).unwrap();
                }
            });
        }
    });

    let hits = counter.construct(&[]).unwrap().get("hits").unwrap();
    assert_eq!(hits.as_list().map(|list| list.len()), Some(4000));
}

#[test]
fn test_concurrent_updates_of_own_field_are_not_lost() {
    let tally = Blueprint::root().extend("Tally", Properties::new().field("count", 0));
    let instance = tally.construct(&[]).unwrap();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let instance = instance.clone();
            scope.spawn(move || {
                for _ in 0..500 {
                    instance
                        .update("count", |count| {
                            if let Value::Int(n) = count {
                                *n += 1;
                            }
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(instance.get("count"), Some(Value::Int(4000)));
}
