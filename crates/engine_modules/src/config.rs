//! Loader configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How module names map to fetchable paths and how often readiness is polled.
///
/// Read from the `[loader]` table of the host config; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory prepended to every module path.
    pub source_root: String,
    /// File extension of module sources, without the dot.
    pub extension: String,
    /// Append a `?<millis>` suffix to every path so caches are bypassed.
    pub cache_bust: bool,
    /// How often `run()` re-checks the readiness predicate while the environment is not
    /// ready.
    pub ready_poll_interval_ms: u64,
    /// Every module ships in one prebuilt bundle. Modules left waiting on each other are
    /// logged and left pending instead of failing the bootstrap.
    pub baked: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source_root: "src".to_string(),
            extension: "toml".to_string(),
            cache_bust: false,
            ready_poll_interval_ms: 13,
            baked: false,
        }
    }
}

impl LoaderConfig {
    pub fn with_source_root(mut self, root: impl Into<String>) -> Self {
        self.source_root = root.into();
        self
    }

    pub fn with_cache_bust(mut self, cache_bust: bool) -> Self {
        self.cache_bust = cache_bust;
        self
    }

    pub fn with_baked(mut self, baked: bool) -> Self {
        self.baked = baked;
        self
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms.max(1))
    }

    /// Path of a module's source: `engine.sound` becomes `src/engine/sound.toml`.
    pub fn resolve_path(&self, module: &str, cache_token: Option<i64>) -> String {
        let relative = module.replace('.', "/");
        let root = self.source_root.trim_end_matches('/');

        let mut path = if root.is_empty() {
            format!("{}.{}", relative, self.extension)
        } else {
            format!("{}/{}.{}", root, relative, self.extension)
        };
        if let Some(token) = cache_token {
            path.push_str(&format!("?{}", token));
        }
        path
    }
}
