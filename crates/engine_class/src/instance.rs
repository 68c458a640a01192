//! Instances created from blueprints.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::blueprint::FieldRef;
use crate::field::{Busy, FieldCell};
use crate::{copy, Blueprint, ClassError, Value};

/// A live object. Cloning yields another reference to the same object.
#[derive(Clone)]
pub struct Instance(Arc<InstanceInner>);

struct InstanceInner {
    blueprint: Blueprint,
    fields: RwLock<BTreeMap<String, Arc<FieldCell>>>,
}

impl Instance {
    pub(crate) fn new(blueprint: Blueprint) -> Self {
        Self(Arc::new(InstanceInner {
            blueprint,
            fields: RwLock::new(BTreeMap::new()),
        }))
    }

    pub(crate) fn insert_own(&self, name: String, value: Value) {
        self.0
            .fields
            .write()
            .insert(name, Arc::new(FieldCell::new(value)));
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.0.blueprint
    }

    pub fn class_name(&self) -> &str {
        self.0.blueprint.name()
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_instance_of(&self, blueprint: &Blueprint) -> bool {
        self.0.blueprint.is_subclass_of(blueprint)
    }

    /// Whether the field lives on the instance itself rather than on its prototype.
    pub fn has_own(&self, name: &str) -> bool {
        self.0.fields.read().contains_key(name)
    }

    fn own_cell(&self, name: &str) -> Option<Arc<FieldCell>> {
        self.0.fields.read().get(name).cloned()
    }

    /// Read a field: the instance's own value first, then the nearest prototype default.
    ///
    /// Inside an `update` of the same field this returns the value as it was before
    /// the update started.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(cell) = self.own_cell(name) {
            return Some(cell.get());
        }
        match self.0.blueprint.lookup_field(name)? {
            FieldRef::Owned(value) => Some(value),
            FieldRef::Shared(cell) => Some(cell.get()),
        }
    }

    /// Write a field on the instance. Never touches the prototype.
    ///
    /// Fails with [`ClassError::FieldBusy`] when called from inside an `update` of the
    /// same own field.
    pub fn set(
        &self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<(), ClassError> {
        let name = name.into();
        let value = value.into();

        let cell = {
            let mut fields = self.0.fields.write();
            match fields.get(&name) {
                Some(cell) => cell.clone(),
                None => {
                    fields.insert(name, Arc::new(FieldCell::new(value)));
                    return Ok(());
                }
            }
        };
        cell.set(value).map_err(|Busy| self.busy(&name))
    }

    /// Mutate a field in place and return what `f` returns.
    ///
    /// Own fields are updated on the instance. A name that resolves to a shared
    /// prototype field updates that one value for every instance. An owned default the
    /// instance has not written yet is copied onto the instance first.
    ///
    /// The field stays locked while `f` runs: other threads wait for the result, and a
    /// nested `set` or `update` of the same field fails with [`ClassError::FieldBusy`].
    pub fn update<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Value) -> R,
    ) -> Result<R, ClassError> {
        let cell = match self.own_cell(name) {
            Some(cell) => cell,
            None => match self.0.blueprint.lookup_field(name) {
                Some(FieldRef::Shared(cell)) => cell,
                Some(FieldRef::Owned(default)) => self
                    .0
                    .fields
                    .write()
                    .entry(name.to_string())
                    .or_insert_with(|| Arc::new(FieldCell::new(copy(&default))))
                    .clone(),
                None => {
                    return Err(ClassError::FieldNotFound {
                        class: self.class_name().to_string(),
                        field: name.to_string(),
                    })
                }
            },
        };
        cell.update(f).map_err(|Busy| self.busy(name))
    }

    fn busy(&self, field: &str) -> ClassError {
        ClassError::FieldBusy {
            class: self.class_name().to_string(),
            field: field.to_string(),
        }
    }

    /// Dispatch a method through the blueprint chain.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, ClassError> {
        let method = self
            .0
            .blueprint
            .lookup_method(name)
            .ok_or_else(|| ClassError::MethodNotFound {
                class: self.class_name().to_string(),
                method: name.to_string(),
            })?;
        method.invoke(self, args)
    }

    pub fn responds_to(&self, name: &str) -> bool {
        self.0.blueprint.responds_to(name)
    }

    /// Error for a method body to return when it cannot complete.
    pub fn fail(&self, method: &str, message: impl Into<String>) -> ClassError {
        ClassError::Method {
            class: self.class_name().to_string(),
            method: method.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.class_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Properties;

    #[test]
    fn test_set_shadows_prototype_default() {
        let blueprint = Blueprint::root().extend("Player", Properties::new().field("speed", 2));
        let a = blueprint.construct(&[]).unwrap();
        let b = blueprint.construct(&[]).unwrap();

        a.set("speed", 5).unwrap();

        assert!(a.has_own("speed"));
        assert!(!b.has_own("speed"));
        assert_eq!(a.get("speed"), Some(Value::Int(5)));
        assert_eq!(b.get("speed"), Some(Value::Int(2)));
    }

    #[test]
    fn test_update_unknown_field_is_reported() {
        let instance = Blueprint::root().construct(&[]).unwrap();
        let err = instance.update("missing", |_| ()).unwrap_err();

        assert!(matches!(
            err,
            ClassError::FieldNotFound { ref class, ref field }
                if class == "Class" && field == "missing"
        ));
    }

    #[test]
    fn test_update_owned_scalar_copies_onto_instance() {
        let blueprint = Blueprint::root().extend("Score", Properties::new().field("points", 10));
        let instance = blueprint.construct(&[]).unwrap();

        let doubled = instance
            .update("points", |v| {
                *v = Value::Int(v.as_int().unwrap_or(0) * 2);
                v.as_int()
            })
            .unwrap();

        assert_eq!(doubled, Some(20));
        assert!(instance.has_own("points"));
        assert_eq!(blueprint.construct(&[]).unwrap().get("points"), Some(Value::Int(10)));
    }

    #[test]
    fn test_set_inside_update_of_same_field_is_refused() {
        let blueprint = Blueprint::root().extend("Score", Properties::new().field("points", 1));
        let instance = blueprint.construct(&[]).unwrap();

        instance
            .update("points", |v| {
                assert_eq!(instance.get("points"), Some(Value::Int(1)));
                let err = instance.set("points", 50).unwrap_err();
                assert!(matches!(
                    err,
                    ClassError::FieldBusy { ref field, .. } if field == "points"
                ));
                instance.set("bonus", 3).unwrap();
                *v = Value::Int(2);
            })
            .unwrap();

        assert_eq!(instance.get("points"), Some(Value::Int(2)));
        assert_eq!(instance.get("bonus"), Some(Value::Int(3)));
    }

    #[test]
    fn test_fail_names_class_and_method() {
        let instance = Blueprint::new("Sprite").construct(&[]).unwrap();
        let err = instance.fail("draw", "no texture");

        assert_eq!(err.to_string(), "Method 'draw' on class Sprite failed: no texture");
        assert!(instance.is_instance_of(instance.blueprint()));
        assert_eq!(format!("{:?}", instance), "Instance(Sprite)");
    }
}
