//! Sensor aliases
//!
//! Maps exact sensor paths to display names. Three settings forms feed the
//! table, later ones overriding earlier ones:
//!
//! 1. `aliases = "/amdcpu/0/load/1=CPU Core 0 T0; /amdcpu/0/load/2=CPU Core 0 T1"`
//! 2. `aliases./amdcpu/0/load/1 = "CPU Core 0 T0"` (an `[aliases]` table)
//! 3. `/amdcpu/0/load/1/name = "CPU Core 0 T0"`

use serde::Serialize;
use std::collections::BTreeMap;

use super::settings::Settings;
use crate::error::{ConfigError, Result};

/// Settings key holding `path=name` pairs.
pub const ALIASES_KEY: &str = "aliases";

const ALIAS_TABLE_PREFIX: &str = "aliases.";
const NAME_SUFFIX: &str = "/name";

/// Exact sensor path to display name mapping.
///
/// Paths are stored lowercased because settings keys are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    /// Create an empty alias table.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Collect every alias entry in `settings`.
    pub fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let mut table = Self::empty();

        if let Some(value) = settings.get(ALIASES_KEY) {
            for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                let (path, name) = pair.split_once('=').ok_or_else(|| {
                    ConfigError::parse(
                        ALIASES_KEY,
                        value,
                        format!("expected path=name, got '{}'", pair),
                    )
                })?;
                table.insert_checked(ALIASES_KEY, value, path, name)?;
            }
        }

        for key in settings.keys() {
            if let Some(path) = key.strip_prefix(ALIAS_TABLE_PREFIX) {
                let name = settings.get(key).unwrap_or_default();
                table.insert_checked(key, name, path, name)?;
            }
        }

        for key in settings.keys() {
            if let Some(path) = key
                .strip_suffix(NAME_SUFFIX)
                .filter(|path| path.starts_with('/'))
            {
                let name = settings.get(key).unwrap_or_default();
                table.insert_checked(key, name, path, name)?;
            }
        }

        Ok(table)
    }

    /// Set the alias for a sensor path.
    pub fn set(&mut self, path: &str, name: impl Into<String>) {
        self.aliases
            .insert(path.trim().to_ascii_lowercase(), name.into());
    }

    /// Look up the display name for `path`.
    ///
    /// Exact match only: `/amdcpu/0/load/1` does not answer for
    /// `/amdcpu/0/load/10`. Callers fall back to the sensor's own name.
    pub fn try_get_alias(&self, path: &str) -> Option<&str> {
        self.aliases
            .get(&path.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether there are no aliases.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Iterate over `(path, name)` pairs in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert_checked(&mut self, key: &str, value: &str, path: &str, name: &str) -> Result<()> {
        let path = path.trim();
        let name = name.trim();
        if !path.starts_with('/') || path.len() < 2 {
            return Err(ConfigError::parse(
                key,
                value,
                format!("alias path '{}' must be a sensor path", path),
            ));
        }
        if name.is_empty() {
            return Err(ConfigError::parse(
                key,
                value,
                format!("empty alias for '{}'", path),
            ));
        }
        self.set(path, name);
        Ok(())
    }
}
