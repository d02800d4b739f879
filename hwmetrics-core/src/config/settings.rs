//! Raw application settings
//!
//! The resolver only sees the [`Settings`] trait: a read-only, case-insensitive
//! key to string lookup. [`SettingsMap`] is the concrete implementation, filled
//! from pairs or from a TOML/YAML settings file whose tables are flattened into
//! dotted keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{ConfigError, Result};

/// Read-only, case-insensitive key/value settings.
pub trait Settings {
    /// Look up the raw value for `key`.
    fn get(&self, key: &str) -> Option<&str>;

    /// All keys, lowercased, in a stable order.
    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    /// Directory that relative file paths in values are resolved against.
    fn base_dir(&self) -> Option<&Path> {
        None
    }

    /// Whether `key` is set at all (an empty value still counts).
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Parse `key` as a boolean, `None` when unset.
    fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key).map(|value| parse_bool(key, value)).transpose()
    }
}

/// Parse `key` with [`FromStr`], `None` when unset.
pub fn get_parsed<T>(settings: &dyn Settings, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    settings
        .get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|e| ConfigError::parse(key, value, e.to_string()))
        })
        .transpose()
}

/// Parse a loosely typed boolean setting.
///
/// Accepts `true/false`, `yes/no`, `on/off` and `1/0`, case-insensitively.
pub fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::parse(key, value, "expected a boolean")),
    }
}

/// In-memory settings with lowercased keys.
///
/// Backed by a `BTreeMap` so key iteration, and therefore resolution, is
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsMap {
    values: BTreeMap<String, String>,
    base_dir: Option<PathBuf>,
}

impl SettingsMap {
    /// Create an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Self::new();
        for (key, value) in pairs {
            settings.insert(key.as_ref(), value);
        }
        settings
    }

    /// Set a value, replacing any previous one for the same key.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value: String = value.into();
        self.values
            .insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    /// Set the directory relative paths are resolved against.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Number of settings.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no settings are present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parse settings from a TOML document.
    ///
    /// Tables flatten into dotted keys (`[graphite] host = "x"` becomes
    /// `graphite.host`). Below a key that starts with `/` the separator is `/`
    /// instead, so `["/amdcpu/0/load/1"] name = "Core"` becomes
    /// `/amdcpu/0/load/1/name`. Arrays are joined with `;`.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(content)?;
        let mut settings = Self::new();
        for (key, value) in &table {
            settings.flatten_toml(key, value);
        }
        Ok(settings)
    }

    /// Parse settings from a YAML document, flattened like [`Self::from_toml_str`].
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let mut settings = Self::new();
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, value) in &map {
                    settings.flatten_yaml(&yaml_scalar(key), value);
                }
            }
            serde_yaml::Value::Null => {}
            _ => {
                return Err(ConfigError::Format(
                    "top-level YAML value must be a mapping".to_string(),
                ))
            }
        }
        Ok(settings)
    }

    /// Load a settings file, choosing YAML for `.yaml`/`.yml` and TOML otherwise.
    ///
    /// The file's directory becomes the base directory for relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading settings from: {}", path.display());
        let content = std::fs::read_to_string(path)?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let settings = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        debug!("Loaded {} settings", settings.len());

        Ok(match path.parent() {
            Some(parent) => settings.with_base_dir(parent),
            None => settings,
        })
    }

    fn flatten_toml(&mut self, key: &str, value: &toml::Value) {
        match value {
            toml::Value::Table(table) => {
                for (child, value) in table {
                    self.flatten_toml(&join_key(key, child), value);
                }
            }
            toml::Value::Array(items) => {
                let joined = items.iter().map(toml_scalar).collect::<Vec<_>>().join(";");
                self.insert(key, joined);
            }
            scalar => self.insert(key, toml_scalar(scalar)),
        }
    }

    fn flatten_yaml(&mut self, key: &str, value: &serde_yaml::Value) {
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (child, value) in map {
                    self.flatten_yaml(&join_key(key, &yaml_scalar(child)), value);
                }
            }
            serde_yaml::Value::Sequence(items) => {
                let joined = items.iter().map(yaml_scalar).collect::<Vec<_>>().join(";");
                self.insert(key, joined);
            }
            serde_yaml::Value::Tagged(tagged) => self.flatten_yaml(key, &tagged.value),
            scalar => self.insert(key, yaml_scalar(scalar)),
        }
    }
}

impl Settings for SettingsMap {
    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn keys(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.values.keys().map(String::as_str))
    }

    fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.starts_with('/') {
        format!("{}/{}", prefix.trim_end_matches('/'), key.trim_start_matches('/'))
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn toml_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        other => other.to_string(),
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
