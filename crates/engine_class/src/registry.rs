//! Shared namespace of named blueprints.
//!
//! Module bodies publish the classes they define here so that later modules can
//! extend or instantiate them by name.

use dashmap::DashMap;

use crate::{Blueprint, ClassError, Properties};

#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: DashMap<String, Blueprint>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the root `Class` blueprint.
    pub fn with_root() -> Self {
        let registry = Self::new();
        let root = Blueprint::root();
        registry.register(root.name().to_string(), root);
        registry
    }

    /// Publish a blueprint under `name`, returning the one it replaced.
    pub fn register(&self, name: impl Into<String>, blueprint: Blueprint) -> Option<Blueprint> {
        let name = name.into();
        let previous = self.classes.insert(name.clone(), blueprint);
        if previous.is_some() {
            tracing::warn!("Class '{}' was registered twice; keeping the newer one", name);
        } else {
            tracing::trace!("Registered class '{}'", name);
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<Blueprint> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// Look up a class, failing with [`ClassError::ClassNotFound`].
    pub fn require(&self, name: &str) -> Result<Blueprint, ClassError> {
        self.get(name)
            .ok_or_else(|| ClassError::ClassNotFound(name.to_string()))
    }

    /// Extend a registered class and register the result under `name`.
    pub fn extend(
        &self,
        parent: &str,
        name: &str,
        properties: Properties,
    ) -> Result<Blueprint, ClassError> {
        let blueprint = self.require(parent)?.extend(name, properties);
        self.register(name, blueprint.clone());
        Ok(blueprint)
    }

    /// Inject into a registered class.
    pub fn inject(&self, name: &str, properties: Properties) -> Result<(), ClassError> {
        self.require(name)?.inject(properties);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
