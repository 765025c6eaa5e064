//! Settings sources feeding the transport factory.
//!
//! A source hands out raw JSON sections by name; typed deserialization
//! happens in [`load_settings`]. A missing section is not an error: the
//! caller gets `T::default()`. A present but malformed section is.

use crate::error::ConfigError;
use figment::Figment;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Provider of named configuration sections (raw JSON only)
pub trait SettingsSource: Send + Sync {
    /// Raw JSON for the section, if present
    fn section(&self, name: &str) -> Option<&Value>;
}

/// In-memory source over a JSON object, e.g. built with `serde_json::json!`
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    root: Value,
}

impl MapSource {
    #[must_use]
    pub fn new(root: Value) -> Self {
        Self { root }
    }
}

impl SettingsSource for MapSource {
    fn section(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }
}

/// Source backed by a [`Figment`] (YAML files, environment overlays, ...).
///
/// The figment is extracted once, at construction.
#[derive(Debug, Clone)]
pub struct FigmentSource {
    root: Value,
}

impl FigmentSource {
    /// # Errors
    /// Returns [`ConfigError::Source`] if the figment cannot be extracted.
    pub fn new(figment: &Figment) -> Result<Self, ConfigError> {
        let root: Value = figment.extract()?;
        Ok(Self { root })
    }
}

impl SettingsSource for FigmentSource {
    fn section(&self, name: &str) -> Option<&Value> {
        self.root.get(name)
    }
}

/// Lenient typed loader: missing or `null` section → `T::default()`.
///
/// # Errors
/// Returns [`ConfigError::InvalidSettings`] if the section exists but cannot
/// be deserialized.
pub fn load_settings<T: DeserializeOwned + Default>(
    source: &dyn SettingsSource,
    section: &str,
) -> Result<T, ConfigError> {
    let Some(raw) = source.section(section) else {
        return Ok(T::default());
    };
    if raw.is_null() {
        return Ok(T::default());
    }

    serde_json::from_value(raw.clone()).map_err(|e| ConfigError::InvalidSettings {
        section: section.to_owned(),
        source: e,
    })
}
