//! Property copying for default field values and configuration blobs.
//!
//! Lists and maps are cloned element by element. Host handles and class
//! instances are atomic and only their reference is copied.
//!
//! There is no cycle detection. Plain data cannot form a cycle on its own; a
//! cycle can only pass through a handle or an instance, and those are never
//! descended into.

use std::collections::BTreeMap;

use crate::Value;

/// Deep-copies plain data, keeping handles and instances shared.
pub fn copy(value: &Value) -> Value {
    match value {
        Value::List(items) => Value::List(items.iter().map(copy).collect()),
        Value::Map(entries) => Value::Map(
            entries
                .iter()
                .map(|(key, item)| (key.clone(), copy(item)))
                .collect(),
        ),
        atomic => atomic.clone(),
    }
}

/// Recursively merges `extended` into `original`.
///
/// Scalars, handles and instances overwrite. A list or map in `extended` is merged
/// entry by entry; when the slot in `original` does not already hold the same kind
/// of container it is replaced by an empty one first.
pub fn merge(original: &mut Value, extended: &Value) {
    match extended {
        Value::List(items) => {
            if let Value::List(target) = original {
                merge_list(target, items);
            } else {
                let mut target = Vec::with_capacity(items.len());
                merge_list(&mut target, items);
                *original = Value::List(target);
            }
        }
        Value::Map(entries) => {
            if let Value::Map(target) = original {
                merge_map(target, entries);
            } else {
                let mut target = BTreeMap::new();
                merge_map(&mut target, entries);
                *original = Value::Map(target);
            }
        }
        atomic => *original = atomic.clone(),
    }
}

fn merge_list(target: &mut Vec<Value>, items: &[Value]) {
    for (index, item) in items.iter().enumerate() {
        match target.get_mut(index) {
            Some(slot) => merge(slot, item),
            None => {
                let mut slot = Value::Null;
                merge(&mut slot, item);
                target.push(slot);
            }
        }
    }
}

fn merge_map(target: &mut BTreeMap<String, Value>, entries: &BTreeMap<String, Value>) {
    for (key, item) in entries {
        merge(target.entry(key.clone()).or_insert(Value::Null), item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Blueprint, Handle};

    #[test]
    fn test_copy_is_deep_for_plain_data() {
        let original = Value::map([("items", Value::list([Value::Int(1), Value::Int(2)]))]);
        let mut copied = copy(&original);

        let items = copied.as_map_mut().unwrap().get_mut("items").unwrap();
        items.as_list_mut().unwrap().push(Value::Int(3));

        assert_eq!(original.as_map().unwrap()["items"].as_list().unwrap().len(), 2);
        assert_eq!(copied.as_map().unwrap()["items"].as_list().unwrap().len(), 3);
    }

    #[test]
    fn test_copy_keeps_instances_and_handles_by_reference() {
        let instance = Blueprint::root().construct(&[]).unwrap();
        let handle = Handle::new(String::from("canvas"));
        let original = Value::list([
            Value::Object(instance.clone()),
            Value::Handle(handle.clone()),
        ]);

        let copied = copy(&original);
        let items = copied.as_list().unwrap();

        assert!(items[0].as_object().unwrap().ptr_eq(&instance));
        assert!(items[1].as_handle().unwrap().ptr_eq(&handle));
    }

    #[test]
    fn test_merge_overlays_nested_maps() {
        let mut settings = Value::from(serde_json::json!({
            "system": {"width": 1024, "height": 671},
            "sound": {"muted": false}
        }));
        let overrides = Value::from(serde_json::json!({
            "system": {"width": 768},
            "storage": {"id": "save"}
        }));

        merge(&mut settings, &overrides);

        assert_eq!(
            settings.to_json(),
            serde_json::json!({
                "system": {"width": 768, "height": 671},
                "sound": {"muted": false},
                "storage": {"id": "save"}
            })
        );
    }

    #[test]
    fn test_merge_replaces_scalar_with_container() {
        let mut slot = Value::Int(4);
        merge(&mut slot, &Value::list([Value::from("a")]));
        assert_eq!(slot, Value::list([Value::from("a")]));
    }
}
