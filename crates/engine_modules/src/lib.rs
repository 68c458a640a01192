//! # Engine Module System
//!
//! Splits engine and game code into named modules with declared dependencies and
//! runs each module's body exactly once, after all of its dependencies.
//!
//! - [`ModuleSystem::declare`] / [`Declaration::requires`] / [`Declaration::body`]
//!   register a module
//! - dependencies nobody has declared are requested from a [`ModuleSource`] (bundled
//!   table, manifest directory, or anything else implementing the trait)
//! - resolution passes repeat until nothing more can run; a stuck queue with no fetch
//!   in flight is reported with the exact dependencies each module is missing
//! - a [`Readiness`] predicate or a [`ReadySignal`] holds the first pass until the host
//!   environment is ready
//!
//! ## Example
//! ```rust
//! use engine_modules::{BundledSource, LoaderConfig, ModuleSystem};
//!
//! let source = BundledSource::new().with_module("game.world", |system| {
//!     system.declare("game.world", None)?.body(|_| Ok(()))?;
//!     Ok(())
//! });
//! let mut system = ModuleSystem::new(LoaderConfig::default(), source);
//!
//! system
//!     .declare("game.main", None)
//!     .unwrap()
//!     .requires(["game.world"])
//!     .body(|_| Ok(()))
//!     .unwrap();
//! system.run().unwrap();
//!
//! assert_eq!(system.load_order(), ["game.world", "game.main"]);
//! ```

mod bootstrap;
mod config;
mod error;
mod loader;
mod manifest;
mod registry;
mod source;

pub use bootstrap::{AlwaysReady, ReadyFlag, ReadySignal, Readiness};
pub use config::LoaderConfig;
pub use error::{DuplicateReason, ModuleError, UnresolvedModule};
pub use manifest::{BodyTable, ManifestSource, ModuleManifest};
pub use registry::{Declaration, ModuleBody, ModuleInfo, ModuleSystem};
pub use source::{
    BundledSource, DeferredSource, FetchCompletion, FetchRequest, Installer, ModuleSource,
    SourceFn,
};
