//! Engine host configuration (`engine.toml`).
//!
//! ```toml
//! entry_module = "engine.core"
//! manifest_dir = "assets"
//!
//! [loader]
//! source_root = "src"
//! cache_bust = false
//! baked = false
//!
//! [logging]
//! directory = "logs"
//!
//! [settings.system]
//! width = 768
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_class::Value;
use engine_modules::LoaderConfig;
use serde::{Deserialize, Serialize};

use crate::modules::ENGINE_CORE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Module the bootstrap starts from.
    pub entry_module: String,
    /// Directory searched for module manifests the host does not bundle.
    pub manifest_dir: Option<PathBuf>,
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
    /// Overrides merged over the engine's default settings.
    pub settings: toml::Table,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory. Defaults to `logs` under the app data directory.
    pub directory: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            entry_module: ENGINE_CORE.to_string(),
            manifest_dir: None,
            loader: LoaderConfig::default(),
            logging: LoggingConfig::default(),
            settings: toml::Table::new(),
        }
    }
}

impl EngineConfig {
    /// Read the config at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config {}", path.display()))
    }

    /// The `[settings]` table as a class-system value.
    pub fn settings_value(&self) -> anyhow::Result<Value> {
        let json = serde_json::to_value(&self.settings).context("Invalid [settings] table")?;
        Ok(Value::from(json))
    }
}
