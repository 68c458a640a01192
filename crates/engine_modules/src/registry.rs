//! The module registry and the declaration surface.
//!
//! Modules are declared in three steps on a [`ModuleSystem`]:
//!
//! ```ignore
//! system
//!     .declare("game.player", Some("1.2"))?
//!     .requires(["engine.sprite", "engine.sound"])
//!     .body(|system| {
//!         // define blueprints, declare more modules...
//!         Ok(())
//!     })?;
//! ```
//!
//! Only one declaration may be open at a time. Binding the body closes it and
//! requests a resolution pass.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::bootstrap::{AlwaysReady, Readiness, Sequencer};
use crate::source::{LoaderEvent, ModuleSource};
use crate::{DuplicateReason, LoaderConfig, ModuleError};

/// Initialization body of a module. Runs at most once, after every dependency has run.
pub type ModuleBody = Box<dyn FnOnce(&mut ModuleSystem) -> anyhow::Result<()> + Send>;

pub(crate) enum Body {
    Unbound,
    Bound(ModuleBody),
    Consumed,
}

pub(crate) struct ModuleRecord {
    pub(crate) version: Option<String>,
    pub(crate) dependencies: Vec<String>,
    pub(crate) body: Body,
    pub(crate) loaded: bool,
}

impl ModuleRecord {
    pub(crate) fn has_body(&self) -> bool {
        matches!(self.body, Body::Bound(_))
    }
}

pub(crate) enum Entry {
    /// Referenced as a dependency and requested from the source, not declared yet.
    Fetching { requested_by: String },
    Declared(ModuleRecord),
}

impl Entry {
    pub(crate) fn is_loaded(&self) -> bool {
        matches!(self, Entry::Declared(record) if record.loaded)
    }
}

/// Snapshot of a declared module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub version: Option<String>,
    pub dependencies: Vec<String>,
    pub loaded: bool,
}

/// Process context holding the registry, the pending queue and the loader state.
///
/// One instance is created by the host and handed to every module body.
pub struct ModuleSystem {
    pub(crate) config: LoaderConfig,
    pub(crate) entries: HashMap<String, Entry>,
    pub(crate) queue: Vec<String>,
    pub(crate) open: Option<String>,
    pub(crate) load_order: Vec<String>,
    pub(crate) in_flight: usize,
    pub(crate) in_pass: bool,
    pub(crate) rerun: bool,
    pub(crate) halted: Option<String>,
    pub(crate) cache_token: Option<i64>,
    pub(crate) source: Box<dyn ModuleSource>,
    pub(crate) sequencer: Sequencer,
    pub(crate) events_tx: Sender<LoaderEvent>,
    pub(crate) events_rx: Receiver<LoaderEvent>,
}

impl ModuleSystem {
    pub fn new(config: LoaderConfig, source: impl ModuleSource + 'static) -> Self {
        let (events_tx, events_rx) = unbounded();
        let cache_token = config
            .cache_bust
            .then(|| chrono::Utc::now().timestamp_millis());

        Self {
            config,
            entries: HashMap::new(),
            queue: Vec::new(),
            open: None,
            load_order: Vec::new(),
            in_flight: 0,
            in_pass: false,
            rerun: false,
            halted: None,
            cache_token,
            source: Box::new(source),
            sequencer: Sequencer::new(Box::new(AlwaysReady)),
            events_tx,
            events_rx,
        }
    }

    /// Gate resolution on an environment readiness predicate (builder pattern).
    pub fn with_readiness(mut self, readiness: impl Readiness + 'static) -> Self {
        self.sequencer = Sequencer::new(Box::new(readiness));
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Begin declaring a module.
    ///
    /// Fails if the name already has a record of its own or if another declaration is
    /// still waiting for its body. A fetch placeholder for the name is replaced.
    pub fn declare(
        &mut self,
        name: impl Into<String>,
        version: Option<&str>,
    ) -> Result<Declaration<'_>, ModuleError> {
        self.ensure_running()?;
        let name = name.into();

        if let Some(open) = &self.open {
            return Err(ModuleError::DuplicateModule {
                name,
                reason: DuplicateReason::OpenDeclaration { open: open.clone() },
            });
        }
        if let Some(Entry::Declared(_)) = self.entries.get(&name) {
            return Err(ModuleError::DuplicateModule {
                name,
                reason: DuplicateReason::AlreadyDefined,
            });
        }

        tracing::trace!("Declaring module '{}'", name);
        self.entries.insert(
            name.clone(),
            Entry::Declared(ModuleRecord {
                version: version.map(str::to_string),
                dependencies: Vec::new(),
                body: Body::Unbound,
                loaded: false,
            }),
        );
        self.queue.push(name.clone());
        self.open = Some(name.clone());

        Ok(Declaration { system: self, name })
    }

    /// Name of the declaration that is waiting for its body, if any.
    pub fn open_declaration(&self) -> Option<&str> {
        self.open.as_deref()
    }

    pub fn module(&self, name: &str) -> Option<ModuleInfo> {
        match self.entries.get(name)? {
            Entry::Declared(record) => Some(ModuleInfo {
                name: name.to_string(),
                version: record.version.clone(),
                dependencies: record.dependencies.clone(),
                loaded: record.loaded,
            }),
            Entry::Fetching { .. } => None,
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(Entry::is_loaded)
    }

    /// True while a fetch for `name` has been issued and the name is still undeclared.
    pub fn is_fetching(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Entry::Fetching { .. }))
    }

    /// Modules in the order their bodies ran.
    pub fn load_order(&self) -> &[String] {
        &self.load_order
    }

    /// Modules still waiting to run, in declaration order.
    pub fn pending(&self) -> Vec<String> {
        self.queue.clone()
    }

    /// Fetches issued and not completed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Nothing pending and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }

    /// Graphviz rendering of the known modules and their dependency edges.
    ///
    /// Loaded modules are filled, fetch placeholders are dashed.
    pub fn to_dot(&self) -> String {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();

        let mut dot = String::from("digraph Modules {\n");
        dot.push_str("  rankdir=LR;\n");
        dot.push_str("  node [shape=box];\n\n");

        for name in names {
            match &self.entries[name] {
                Entry::Fetching { requested_by } => {
                    dot.push_str(&format!(
                        "  \"{}\" [style=dashed, tooltip=\"requested by {}\"];\n",
                        name, requested_by
                    ));
                }
                Entry::Declared(record) => {
                    let label = match &record.version {
                        Some(version) => format!("{} {}", name, version),
                        None => name.clone(),
                    };
                    let style = if record.loaded { ", style=filled" } else { "" };
                    dot.push_str(&format!("  \"{}\" [label=\"{}\"{}];\n", name, label, style));

                    for dep in &record.dependencies {
                        dot.push_str(&format!("  \"{}\" -> \"{}\";\n", dep, name));
                    }
                }
            }
        }

        dot.push_str("}\n");
        dot
    }

    pub(crate) fn ensure_running(&self) -> Result<(), ModuleError> {
        match &self.halted {
            Some(cause) => Err(ModuleError::Halted {
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    fn record_mut(&mut self, name: &str) -> Option<&mut ModuleRecord> {
        match self.entries.get_mut(name)? {
            Entry::Declared(record) => Some(record),
            Entry::Fetching { .. } => None,
        }
    }
}

/// An open declaration. Finish it with [`Declaration::body`].
///
/// Dropping it without a body leaves the declaration open, and the next `declare`
/// fails with [`DuplicateReason::OpenDeclaration`].
#[must_use = "a declaration stays open until `body` is called"]
pub struct Declaration<'a> {
    system: &'a mut ModuleSystem,
    name: String,
}

impl Declaration<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append dependencies. Order is kept; empty names are skipped.
    pub fn requires<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(record) = self.system.record_mut(&self.name) {
            record.dependencies.extend(
                names
                    .into_iter()
                    .map(Into::into)
                    .filter(|name: &String| !name.is_empty()),
            );
        }
        self
    }

    /// Bind the body, close the declaration and request a resolution pass.
    pub fn body<F>(self, body: F) -> Result<(), ModuleError>
    where
        F: FnOnce(&mut ModuleSystem) -> anyhow::Result<()> + Send + 'static,
    {
        let Declaration { system, name } = self;
        system.ensure_running()?;

        if let Some(record) = system.record_mut(&name) {
            record.body = Body::Bound(Box::new(body));
        }
        if system.open.as_deref() == Some(name.as_str()) {
            system.open = None;
        }
        tracing::trace!("Module '{}' is defined", name);

        system.request_resolution()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeferredSource;

    fn system() -> ModuleSystem {
        ModuleSystem::new(LoaderConfig::default(), DeferredSource::new())
    }

    #[test]
    fn test_declared_module_without_dependencies_runs_on_body() {
        let mut system = system();
        system
            .declare("game.main", Some("0.1"))
            .unwrap()
            .body(|_| Ok(()))
            .unwrap();

        assert!(system.is_loaded("game.main"));
        assert_eq!(system.load_order(), ["game.main".to_string()]);
        assert_eq!(system.module("game.main").unwrap().version.as_deref(), Some("0.1"));
        assert!(system.is_idle());
    }

    #[test]
    fn test_requires_skips_empty_names() {
        let mut system = system();
        let declaration = system
            .declare("game.main", None)
            .unwrap()
            .requires(["game.a", "", "game.b"]);
        assert_eq!(declaration.name(), "game.main");
        drop(declaration);

        let info = system.module("game.main").unwrap();
        assert_eq!(info.dependencies, vec!["game.a", "game.b"]);
        assert!(!info.loaded);
        assert_eq!(system.open_declaration(), Some("game.main"));
    }

    #[test]
    fn test_open_declaration_blocks_next_declare() {
        let mut system = system();
        let _ = system.declare("game.a", None).unwrap();

        let err = system.declare("game.b", None).err().unwrap();
        assert!(matches!(
            err,
            ModuleError::DuplicateModule {
                reason: DuplicateReason::OpenDeclaration { ref open },
                ..
            } if open == "game.a"
        ));
        assert!(system.module("game.b").is_none());
    }

    #[test]
    fn test_dot_lists_edges_and_placeholders() {
        let mut system = system();
        system
            .declare("game.main", None)
            .unwrap()
            .requires(["game.world"])
            .body(|_| Ok(()))
            .unwrap();

        let dot = system.to_dot();
        assert!(dot.contains("digraph Modules"));
        assert!(dot.contains("\"game.world\" -> \"game.main\""));
        assert!(dot.contains("\"game.world\" [style=dashed"));
        assert!(system.is_fetching("game.world"));
    }
}
