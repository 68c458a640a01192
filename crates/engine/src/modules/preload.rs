//! Assets game modules queue for the loader before the game starts.

use std::collections::BTreeMap;

use engine_class::Value;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Preload {
    /// Graphics and data files, in registration order.
    pub resources: Vec<String>,
    /// Sound name to path.
    pub sounds: BTreeMap<String, String>,
    /// Music name to path.
    pub music: BTreeMap<String, String>,
}

impl Preload {
    pub fn add_asset(&mut self, path: impl Into<String>) {
        self.resources.push(path.into());
    }

    /// Register a sound under `name`, or under its path when no name is given.
    pub fn add_sound(&mut self, path: impl Into<String>, name: Option<&str>) {
        let path = path.into();
        let name = name.map_or_else(|| path.clone(), str::to_string);
        self.sounds.insert(name, path);
    }

    pub fn add_music(&mut self, path: impl Into<String>, name: Option<&str>) {
        let path = path.into();
        let name = name.map_or_else(|| path.clone(), str::to_string);
        self.music.insert(name, path);
    }

    /// Paths of every registered sound and music track.
    pub fn audio_resources(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .sounds
            .values()
            .chain(self.music.values())
            .cloned()
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    pub(super) fn audio_value(&self) -> Value {
        Value::list(self.audio_resources().into_iter().map(Value::from))
    }

    pub(super) fn cache_value(cache: &BTreeMap<String, String>) -> Value {
        Value::map(
            cache
                .iter()
                .map(|(name, path)| (name.as_str(), Value::from(path.as_str()))),
        )
    }
}
