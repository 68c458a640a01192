//! Blueprints: class definitions built by extension and patched by injection.
//!
//! A blueprint owns a table of members (methods and field defaults) and points at
//! the blueprint it extends. Dispatch walks that chain at call time, so a member
//! injected into any level is seen by every instance created from it or from one of
//! its descendants, including instances that already exist.
//!
//! ## Parent calls
//!
//! A method opts in to calling the implementation it shadows by being declared with
//! [`Properties::override_method`]. It then receives a [`Super`] bound to the same
//! instance. The shadowed implementation is resolved per call and handed down the
//! Rust call stack, so nested parent calls across several levels never share state.
//!
//! - Methods added by [`Blueprint::extend`] resolve their parent through the parent
//!   blueprint on every call.
//! - Methods added by [`Blueprint::inject`] capture whatever implementation was
//!   visible (own or inherited) at injection time.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::field::FieldCell;
use crate::{copy, ClassError, Instance, Value};

/// Name of the initializer run by [`Blueprint::construct`].
pub const INIT: &str = "init";

/// A method that does not call its parent.
pub type MethodFn = dyn Fn(&Instance, &[Value]) -> Result<Value, ClassError> + Send + Sync;

/// A method that receives the implementation it shadows.
pub type OverrideFn =
    dyn Fn(&Instance, &Super<'_>, &[Value]) -> Result<Value, ClassError> + Send + Sync;

/// Hook run before field copying and `init`; returning `Some` replaces the new instance.
pub type StaticInitFn =
    dyn Fn(&Instance, &[Value]) -> Result<Option<Instance>, ClassError> + Send + Sync;

/// How a field default reaches instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldPolicy {
    /// Every instance gets its own deep copy of a list or map default at construction.
    /// Scalar defaults are read through the prototype until the instance sets them.
    Owned,
    /// A single value on the prototype, read and mutated in place by every instance.
    Shared,
}

#[derive(Clone)]
enum Callable {
    Plain(Arc<MethodFn>),
    Override(Arc<OverrideFn>),
}

enum ParentLink {
    None,
    Chain(Blueprint),
    Captured(Arc<MethodSlot>),
}

pub(crate) struct MethodSlot {
    class: String,
    name: String,
    callable: Callable,
    parent: ParentLink,
}

impl MethodSlot {
    pub(crate) fn invoke(&self, this: &Instance, args: &[Value]) -> Result<Value, ClassError> {
        match &self.callable {
            Callable::Plain(f) => f(this, args),
            Callable::Override(f) => {
                let shadowed = match &self.parent {
                    ParentLink::None => None,
                    ParentLink::Chain(parent) => parent.lookup_method(&self.name),
                    ParentLink::Captured(slot) => Some(slot.clone()),
                };
                let parent = Super {
                    instance: this,
                    class: &self.class,
                    method: &self.name,
                    shadowed,
                };
                f(this, &parent, args)
            }
        }
    }
}

/// The implementation shadowed by an overriding method, bound to the receiving instance.
pub struct Super<'a> {
    instance: &'a Instance,
    class: &'a str,
    method: &'a str,
    shadowed: Option<Arc<MethodSlot>>,
}

impl Super<'_> {
    /// Whether there is anything to call.
    pub fn exists(&self) -> bool {
        self.shadowed.is_some()
    }

    /// Invoke the shadowed implementation on the same instance.
    pub fn call(&self, args: &[Value]) -> Result<Value, ClassError> {
        match &self.shadowed {
            Some(slot) => slot.invoke(self.instance, args),
            None => Err(ClassError::NoParentMethod {
                class: self.class.to_string(),
                method: self.method.to_string(),
            }),
        }
    }
}

#[derive(Clone)]
enum Member {
    Method(Arc<MethodSlot>),
    Owned(Value),
    Shared(Arc<FieldCell>),
}

/// A field as found on the prototype chain.
pub(crate) enum FieldRef {
    /// Default value; instances copy it before writing.
    Owned(Value),
    /// The one value every instance reads and updates.
    Shared(Arc<FieldCell>),
}

enum PropertyDef {
    Method(Callable),
    Field(FieldPolicy, Value),
}

/// Members handed to [`Blueprint::extend`] or [`Blueprint::inject`], applied in insertion order.
#[derive(Default)]
pub struct Properties {
    entries: Vec<(String, PropertyDef)>,
    static_init: Option<Arc<StaticInitFn>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<Value, ClassError> + Send + Sync + 'static,
    {
        self.entries
            .push((name.into(), PropertyDef::Method(Callable::Plain(Arc::new(f)))));
        self
    }

    pub fn override_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Instance, &Super<'_>, &[Value]) -> Result<Value, ClassError> + Send + Sync + 'static,
    {
        self.entries
            .push((name.into(), PropertyDef::Method(Callable::Override(Arc::new(f)))));
        self
    }

    /// Initializer, run with the construction arguments. Its return value is ignored.
    pub fn init<F>(self, f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<(), ClassError> + Send + Sync + 'static,
    {
        self.method(INIT, move |this, args| f(this, args).map(|()| Value::Null))
    }

    /// Initializer that can run the inherited one through `Super`.
    pub fn override_init<F>(self, f: F) -> Self
    where
        F: Fn(&Instance, &Super<'_>, &[Value]) -> Result<(), ClassError> + Send + Sync + 'static,
    {
        self.override_method(INIT, move |this, parent, args| {
            f(this, parent, args).map(|()| Value::Null)
        })
    }

    pub fn static_init<F>(mut self, f: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<Option<Instance>, ClassError> + Send + Sync + 'static,
    {
        self.static_init = Some(Arc::new(f));
        self
    }

    /// Field default copied into every instance.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .push((name.into(), PropertyDef::Field(FieldPolicy::Owned, value.into())));
        self
    }

    /// Field default shared by reference between all instances.
    pub fn shared_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .push((name.into(), PropertyDef::Field(FieldPolicy::Shared, value.into())));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.static_init.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy)]
enum Binding {
    Extend,
    Inject,
}

/// A class definition. Cloning is cheap and yields the same blueprint.
#[derive(Clone)]
pub struct Blueprint(Arc<BlueprintInner>);

struct BlueprintInner {
    name: String,
    parent: Option<Blueprint>,
    members: RwLock<HashMap<String, Member>>,
    static_init: RwLock<Option<Arc<StaticInitFn>>>,
}

impl Blueprint {
    /// The base class every other blueprint is extended from.
    pub fn root() -> Self {
        Self::new("Class")
    }

    /// A new base class with no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parent(name.into(), None)
    }

    fn with_parent(name: String, parent: Option<Blueprint>) -> Self {
        Self(Arc::new(BlueprintInner {
            name,
            parent,
            members: RwLock::new(HashMap::new()),
            static_init: RwLock::new(None),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Blueprint> {
        self.0.parent.as_ref()
    }

    pub fn ptr_eq(&self, other: &Blueprint) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Create a subtype. `self` is left untouched.
    pub fn extend(&self, name: impl Into<String>, properties: Properties) -> Blueprint {
        let child = Self::with_parent(name.into(), Some(self.clone()));
        tracing::trace!(
            "Extending {} into {} ({} properties)",
            self.name(),
            child.name(),
            properties.len()
        );
        child.apply(properties, Binding::Extend);
        child
    }

    /// Patch this blueprint in place. Existing instances see the change on their next call.
    pub fn inject(&self, properties: Properties) {
        tracing::debug!("Injecting {} properties into {}", properties.len(), self.name());
        self.apply(properties, Binding::Inject);
    }

    fn apply(&self, properties: Properties, binding: Binding) {
        for (name, def) in properties.entries {
            let member = match def {
                PropertyDef::Field(FieldPolicy::Owned, value) => Member::Owned(value),
                PropertyDef::Field(FieldPolicy::Shared, value) => {
                    Member::Shared(Arc::new(FieldCell::new(value)))
                }
                PropertyDef::Method(callable) => {
                    let parent = match (&callable, binding) {
                        (Callable::Plain(_), _) => ParentLink::None,
                        (Callable::Override(_), Binding::Extend) => match &self.0.parent {
                            Some(parent) => ParentLink::Chain(parent.clone()),
                            None => ParentLink::None,
                        },
                        (Callable::Override(_), Binding::Inject) => {
                            match self.lookup_method(&name) {
                                Some(previous) => ParentLink::Captured(previous),
                                None => ParentLink::None,
                            }
                        }
                    };
                    Member::Method(Arc::new(MethodSlot {
                        class: self.0.name.clone(),
                        name: name.clone(),
                        callable,
                        parent,
                    }))
                }
            };
            self.0.members.write().insert(name, member);
        }

        if let Some(hook) = properties.static_init {
            *self.0.static_init.write() = Some(hook);
        }
    }

    /// Build an instance.
    ///
    /// Runs `static_init` first (a `Some` result is returned as the instance), then copies
    /// owned list/map defaults onto the instance, then runs `init` if one is defined.
    pub fn construct(&self, args: &[Value]) -> Result<Instance, ClassError> {
        let instance = Instance::new(self.clone());

        if let Some(hook) = self.lookup_static_init() {
            if let Some(replacement) = hook(&instance, args)? {
                tracing::trace!("static_init of {} returned a replacement", self.name());
                return Ok(replacement);
            }
        }

        for (name, value) in self.owned_defaults() {
            instance.insert_own(name, value);
        }

        if let Some(init) = self.lookup_method(INIT) {
            init.invoke(&instance, args)?;
        }

        Ok(instance)
    }

    /// True if a method of that name is reachable from this blueprint.
    pub fn responds_to(&self, name: &str) -> bool {
        self.lookup_method(name).is_some()
    }

    /// True if `self` is `other` or extends it, directly or not.
    pub fn is_subclass_of(&self, other: &Blueprint) -> bool {
        self.chain().any(|level| level.ptr_eq(other))
    }

    fn chain(&self) -> impl Iterator<Item = &Blueprint> {
        std::iter::successors(Some(self), |&level| level.0.parent.as_ref())
    }

    pub(crate) fn lookup_method(&self, name: &str) -> Option<Arc<MethodSlot>> {
        for level in self.chain() {
            match level.0.members.read().get(name) {
                Some(Member::Method(slot)) => return Some(slot.clone()),
                Some(Member::Owned(_) | Member::Shared(_)) => return None,
                None => {}
            }
        }
        None
    }

    pub(crate) fn lookup_field(&self, name: &str) -> Option<FieldRef> {
        for level in self.chain() {
            match level.0.members.read().get(name) {
                Some(Member::Owned(value)) => return Some(FieldRef::Owned(value.clone())),
                Some(Member::Shared(cell)) => return Some(FieldRef::Shared(cell.clone())),
                Some(Member::Method(_)) => return None,
                None => {}
            }
        }
        None
    }

    fn lookup_static_init(&self) -> Option<Arc<StaticInitFn>> {
        self.chain()
            .find_map(|level| level.0.static_init.read().clone())
    }

    fn owned_defaults(&self) -> Vec<(String, Value)> {
        let mut seen = HashSet::new();
        let mut defaults = Vec::new();
        for level in self.chain() {
            for (name, member) in level.0.members.read().iter() {
                if !seen.insert(name.clone()) {
                    continue;
                }
                if let Member::Owned(value) = member {
                    if value.is_composite() {
                        defaults.push((name.clone(), copy(value)));
                    }
                }
            }
        }
        defaults
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent() {
            Some(parent) => write!(f, "Blueprint({} < {})", self.name(), parent.name()),
            None => write!(f, "Blueprint({})", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Blueprint {
        Blueprint::root().extend(
            "Counter",
            Properties::new()
                .field("count", 0)
                .method("bump", |this, _| {
                    let next = this.get("count").and_then(|v| v.as_int()).unwrap_or(0) + 1;
                    this.set("count", next)?;
                    Ok(Value::Int(next))
                }),
        )
    }

    #[test]
    fn test_construct_without_init() {
        let blueprint = counter();
        let instance = blueprint.construct(&[]).unwrap();

        assert_eq!(instance.get("count"), Some(Value::Int(0)));
        assert!(!blueprint.responds_to(INIT));
    }

    #[test]
    fn test_init_receives_arguments() {
        let blueprint = counter().extend(
            "StartingCounter",
            Properties::new().init(|this, args| {
                this.set("count", args[0].clone())
            }),
        );

        let instance = blueprint.construct(&[Value::Int(41)]).unwrap();
        assert_eq!(instance.call("bump", &[]).unwrap(), Value::Int(42));
    }

    #[test]
    fn test_missing_method_is_reported() {
        let instance = counter().construct(&[]).unwrap();
        let err = instance.call("fly", &[]).unwrap_err();

        assert!(matches!(err, ClassError::MethodNotFound { ref method, .. } if method == "fly"));
    }

    #[test]
    fn test_field_shadows_inherited_method() {
        let child = counter().extend("Frozen", Properties::new().field("bump", false));

        assert!(!child.responds_to("bump"));
        assert_eq!(child.construct(&[]).unwrap().get("bump"), Some(Value::Bool(false)));
    }

    #[test]
    fn test_override_without_parent_reports_missing_parent() {
        let blueprint = Blueprint::root().extend(
            "Lonely",
            Properties::new().override_method("speak", |_, parent, args| {
                assert!(!parent.exists());
                parent.call(args)
            }),
        );

        let err = blueprint.construct(&[]).unwrap().call("speak", &[]).unwrap_err();
        assert!(matches!(err, ClassError::NoParentMethod { ref class, .. } if class == "Lonely"));
    }

    #[test]
    fn test_subclass_relationship() {
        let base = counter();
        let child = base.extend("Child", Properties::new());
        let other = Blueprint::root().extend("Other", Properties::new());

        assert!(child.is_subclass_of(&base));
        assert!(child.is_subclass_of(&child));
        assert!(!base.is_subclass_of(&child));
        assert!(!child.is_subclass_of(&other));
        assert_eq!(format!("{:?}", child), "Blueprint(Child < Counter)");
    }
}
