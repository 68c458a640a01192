//! Module manifests read from disk.
//!
//! A manifest describes one module in TOML:
//!
//! ```toml
//! name = "game.player"
//! version = "1.0"
//! requires = ["engine.sprite", "engine.sound"]
//! body = "player"
//! ```
//!
//! Code cannot be loaded from a file, so `body` names an entry of a [`BodyTable`]
//! compiled into the host. Without `body`, the module name itself is looked up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::source::{FetchCompletion, FetchRequest, ModuleSource, SourceFn};
use crate::ModuleSystem;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl ModuleManifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read module manifest {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse module manifest {}", path.display()))
    }

    /// Key of the body to run: `body` if set, the module name otherwise.
    pub fn body_key(&self) -> &str {
        self.body.as_deref().unwrap_or(&self.name)
    }
}

/// Named module bodies that manifests can refer to.
#[derive(Clone, Default)]
pub struct BodyTable {
    bodies: HashMap<String, Arc<SourceFn>>,
}

impl BodyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body<F>(mut self, key: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut ModuleSystem) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.bodies.insert(key.into(), Arc::new(body));
        self
    }

    pub fn get(&self, key: &str) -> Option<Arc<SourceFn>> {
        self.bodies.get(key).cloned()
    }
}

/// Loads modules from manifest files under a root directory.
pub struct ManifestSource {
    root: PathBuf,
    bodies: BodyTable,
}

impl ManifestSource {
    pub fn new(root: impl Into<PathBuf>, bodies: BodyTable) -> Self {
        Self {
            root: root.into(),
            bodies,
        }
    }

    /// File path of a request. A cache-busting query suffix is dropped.
    pub fn file_path(&self, request: &FetchRequest) -> PathBuf {
        let relative = request
            .path
            .split_once('?')
            .map_or(request.path.as_str(), |(path, _)| path);
        self.root.join(relative)
    }

    fn installer(&self, request: &FetchRequest) -> anyhow::Result<(ModuleManifest, Arc<SourceFn>)> {
        let manifest = ModuleManifest::load(&self.file_path(request))?;
        if manifest.name != request.module {
            tracing::warn!(
                "Manifest at {} declares '{}' instead of '{}'",
                request.path,
                manifest.name,
                request.module
            );
        }
        let body = self
            .bodies
            .get(manifest.body_key())
            .with_context(|| format!("No module body registered as '{}'", manifest.body_key()))?;
        Ok((manifest, body))
    }
}

impl ModuleSource for ManifestSource {
    fn fetch(&mut self, request: FetchRequest, completion: FetchCompletion) {
        match self.installer(&request) {
            Ok((manifest, body)) => completion.succeed(move |system| {
                system
                    .declare(manifest.name, manifest.version.as_deref())?
                    .requires(manifest.requires)
                    .body(move |system| (*body)(system))?;
                Ok(())
            }),
            Err(err) => completion.fail(format!("{:#}", err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_defaults() {
        let manifest: ModuleManifest = toml::from_str("name = \"game.hud\"").unwrap();

        assert_eq!(manifest.body_key(), "game.hud");
        assert!(manifest.requires.is_empty());
        assert!(manifest.version.is_none());
    }

    #[test]
    fn test_file_path_drops_cache_token() {
        let source = ManifestSource::new("/assets", BodyTable::new());
        let request = FetchRequest {
            module: "game.hud".into(),
            requested_by: "game.main".into(),
            path: "src/game/hud.toml?1712".into(),
        };

        assert_eq!(source.file_path(&request), PathBuf::from("/assets/src/game/hud.toml"));
    }
}
