//! Backend selection
//!
//! Exactly one telemetry backend is active. Each backend owns a settings
//! section (`graphite.*`, `influx.*`, `prometheus.*`, `timescale.*`); a section
//! is present when `<backend>.enabled` is true, or when that flag is absent
//! and any other key of the section is set. The top-level `type` key marks a
//! backend present as well. Two present sections are a conflict; none means
//! the Graphite defaults.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use url::Url;

use super::settings::{get_parsed, Settings};
use crate::error::{ConfigError, Result};

/// Settings key naming the backend explicitly.
pub const TYPE_KEY: &str = "type";

/// Default Graphite host
pub const DEFAULT_GRAPHITE_HOST: &str = "localhost";
/// Default Graphite plaintext port
pub const DEFAULT_GRAPHITE_PORT: u16 = 2003;
/// Default Prometheus listen host
pub const DEFAULT_PROMETHEUS_HOST: &str = "0.0.0.0";
/// Default Prometheus listen port
pub const DEFAULT_PROMETHEUS_PORT: u16 = 4445;
/// Default InfluxDB database
pub const DEFAULT_INFLUX_DB: &str = "hwmetrics";

/// Backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Graphite,
    Influx,
    Prometheus,
    Timescale,
}

impl BackendKind {
    /// Every backend, in settings order.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::Graphite,
        BackendKind::Influx,
        BackendKind::Prometheus,
        BackendKind::Timescale,
    ];

    /// Settings section name.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Graphite => "graphite",
            BackendKind::Influx => "influx",
            BackendKind::Prometheus => "prometheus",
            BackendKind::Timescale => "timescale",
        }
    }

    fn enabled_key(&self) -> &'static str {
        match self {
            BackendKind::Graphite => "graphite.enabled",
            BackendKind::Influx => "influx.enabled",
            BackendKind::Prometheus => "prometheus.enabled",
            BackendKind::Timescale => "timescale.enabled",
        }
    }

    fn field_keys(&self) -> &'static [&'static str] {
        match self {
            BackendKind::Graphite => &["graphite.host", "graphite.port", "graphite.tags"],
            BackendKind::Influx => &[
                "influx.address",
                "influx.db",
                "influx.user",
                "influx.password",
            ],
            BackendKind::Prometheus => &["prometheus.host", "prometheus.port"],
            BackendKind::Timescale => &["timescale.connection", "timescale.setup"],
        }
    }

    fn is_present(&self, settings: &dyn Settings, explicit: Option<BackendKind>) -> Result<bool> {
        if let Some(enabled) = settings.get_bool(self.enabled_key())? {
            return Ok(enabled);
        }
        Ok(explicit == Some(*self) || self.field_keys().iter().any(|k| settings.contains(k)))
    }

    fn build(&self, settings: &dyn Settings) -> Result<BackendConfig> {
        match self {
            BackendKind::Graphite => {
                GraphiteConfig::from_settings(settings).map(BackendConfig::Graphite)
            }
            BackendKind::Influx => InfluxConfig::from_settings(settings).map(BackendConfig::Influx),
            BackendKind::Prometheus => {
                PrometheusConfig::from_settings(settings).map(BackendConfig::Prometheus)
            }
            BackendKind::Timescale => {
                TimescaleConfig::from_settings(settings).map(BackendConfig::Timescale)
            }
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "graphite" => Ok(BackendKind::Graphite),
            "influx" | "influxdb" => Ok(BackendKind::Influx),
            "prometheus" => Ok(BackendKind::Prometheus),
            "timescale" | "timescaledb" => Ok(BackendKind::Timescale),
            _ => Err(format!(
                "unknown backend type '{}'. Valid options: graphite, influx, prometheus, timescale",
                s
            )),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Graphite plaintext protocol backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphiteConfig {
    pub host: String,
    pub port: u16,
    /// Send tagged metric names (`name;tag=value`)
    pub tags: bool,
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GRAPHITE_HOST.to_string(),
            port: DEFAULT_GRAPHITE_PORT,
            tags: false,
        }
    }
}

impl GraphiteConfig {
    fn from_settings(settings: &dyn Settings) -> Result<Self> {
        Ok(Self {
            host: non_empty(settings, "graphite.host")
                .unwrap_or(DEFAULT_GRAPHITE_HOST)
                .to_string(),
            port: port(settings, "graphite.port")?.unwrap_or(DEFAULT_GRAPHITE_PORT),
            tags: settings.get_bool("graphite.tags")?.unwrap_or(false),
        })
    }
}

/// InfluxDB HTTP backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InfluxConfig {
    pub address: Url,
    pub db: String,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl InfluxConfig {
    fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let raw = non_empty(settings, "influx.address").ok_or(ConfigError::MissingField {
            backend: "influx",
            key: "influx.address",
        })?;
        let address =
            Url::parse(raw).map_err(|e| ConfigError::parse("influx.address", raw, e.to_string()))?;
        if !matches!(address.scheme(), "http" | "https") {
            return Err(ConfigError::parse(
                "influx.address",
                raw,
                "expected an http or https URL",
            ));
        }

        Ok(Self {
            address,
            db: non_empty(settings, "influx.db")
                .unwrap_or(DEFAULT_INFLUX_DB)
                .to_string(),
            user: non_empty(settings, "influx.user").map(str::to_string),
            password: non_empty(settings, "influx.password").map(str::to_string),
        })
    }
}

/// Prometheus scrape endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrometheusConfig {
    pub host: String,
    pub port: u16,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PROMETHEUS_HOST.to_string(),
            port: DEFAULT_PROMETHEUS_PORT,
        }
    }
}

impl PrometheusConfig {
    fn from_settings(settings: &dyn Settings) -> Result<Self> {
        Ok(Self {
            host: non_empty(settings, "prometheus.host")
                .unwrap_or(DEFAULT_PROMETHEUS_HOST)
                .to_string(),
            port: port(settings, "prometheus.port")?.unwrap_or(DEFAULT_PROMETHEUS_PORT),
        })
    }
}

/// TimescaleDB (PostgreSQL) backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimescaleConfig {
    /// Connection string; may embed credentials, so never serialized
    #[serde(skip_serializing)]
    pub connection: String,
    /// Create the metrics table and hypertable on startup
    pub setup_table: bool,
}

impl TimescaleConfig {
    fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let connection =
            non_empty(settings, "timescale.connection").ok_or(ConfigError::MissingField {
                backend: "timescale",
                key: "timescale.connection",
            })?;

        Ok(Self {
            connection: connection.to_string(),
            setup_table: settings.get_bool("timescale.setup")?.unwrap_or(true),
        })
    }
}

/// The single active backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    Graphite(GraphiteConfig),
    Influx(InfluxConfig),
    Prometheus(PrometheusConfig),
    Timescale(TimescaleConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Graphite(GraphiteConfig::default())
    }
}

impl BackendConfig {
    /// Which backend this is.
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::Graphite(_) => BackendKind::Graphite,
            BackendConfig::Influx(_) => BackendKind::Influx,
            BackendConfig::Prometheus(_) => BackendKind::Prometheus,
            BackendConfig::Timescale(_) => BackendKind::Timescale,
        }
    }
}

/// Pick the single configured backend.
///
/// # Errors
///
/// - [`ConfigError::Conflict`] when more than one section is present
/// - [`ConfigError::MissingField`] when the present section lacks a required key
/// - [`ConfigError::Parse`] for malformed values
pub fn select_backend(settings: &dyn Settings) -> Result<BackendConfig> {
    let explicit = get_parsed::<BackendKind>(settings, TYPE_KEY)?;

    let mut present = Vec::new();
    for kind in BackendKind::ALL {
        if kind.is_present(settings, explicit)? {
            present.push(kind);
        }
    }

    match present.as_slice() {
        [] => {
            debug!("No backend configured, defaulting to graphite");
            Ok(BackendConfig::default())
        }
        [kind] => {
            debug!("Selected backend: {}", kind);
            kind.build(settings)
        }
        _ => Err(ConfigError::Conflict {
            backends: present.iter().map(BackendKind::name).collect(),
        }),
    }
}

fn non_empty<'a>(settings: &'a dyn Settings, key: &str) -> Option<&'a str> {
    settings.get(key).filter(|v| !v.is_empty())
}

fn port(settings: &dyn Settings, key: &str) -> Result<Option<u16>> {
    match get_parsed::<u16>(settings, key)? {
        Some(0) => Err(ConfigError::parse(key, "0", "port must be non-zero")),
        port => Ok(port),
    }
}
