//! Configuration resolution
//!
//! Turns raw [`Settings`] into one immutable [`ResolvedConfig`]:
//!
//! 1. poll interval
//! 2. enabled hardware categories
//! 3. backend selection ([`select_backend`])
//! 4. hidden sensor rules, disabling categories that are hidden in full
//! 5. alias table
//! 6. host name override
//! 7. certificate verification policy, installed through a [`TrustPolicySink`]
//!
//! Any failure aborts resolution; the trust policy is installed last so a
//! rejected configuration never changes it.

mod aliases;
mod backend;
mod hidden;
mod paths;
mod settings;

pub use aliases::{AliasTable, ALIASES_KEY};
pub use backend::{
    select_backend, BackendConfig, BackendKind, GraphiteConfig, InfluxConfig, PrometheusConfig,
    TimescaleConfig, DEFAULT_GRAPHITE_HOST, DEFAULT_GRAPHITE_PORT, DEFAULT_INFLUX_DB,
    DEFAULT_PROMETHEUS_HOST, DEFAULT_PROMETHEUS_PORT, TYPE_KEY,
};
pub use hidden::{HiddenSensors, HIDDEN_SUFFIX};
pub use paths::default_config_path;
pub use settings::{get_parsed, parse_bool, Settings, SettingsMap};

use serde::{Serialize, Serializer};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::hardware::{EnabledHardware, HardwareCategory};
use crate::tls::{
    install_certificate_verification, GlobalTrustPolicy, TrustPolicySink,
    CERTIFICATE_VERIFICATION_KEY,
};

/// Settings key for the poll/send interval in seconds.
pub const INTERVAL_KEY: &str = "interval";
/// Settings key for the host name override.
pub const STATIC_NAME_KEY: &str = "static-name";
/// Interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// Fully resolved exporter configuration.
///
/// Immutable once built and safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfig {
    #[serde(rename = "interval_secs", serialize_with = "serialize_secs")]
    interval: Duration,
    backend: BackendConfig,
    enabled_hardware: EnabledHardware,
    hidden_sensors: HiddenSensors,
    aliases: AliasTable,
    lookup_name_override: Option<String>,
}

impl ResolvedConfig {
    /// Resolve `settings`, installing the trust policy process-wide.
    pub fn from_settings(settings: &dyn Settings) -> Result<Self> {
        ConfigResolver::new(&GlobalTrustPolicy).resolve(settings)
    }

    /// Poll/send interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The active backend.
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Graphite settings, if Graphite is the active backend.
    pub fn graphite(&self) -> Option<&GraphiteConfig> {
        match &self.backend {
            BackendConfig::Graphite(config) => Some(config),
            _ => None,
        }
    }

    /// InfluxDB settings, if InfluxDB is the active backend.
    pub fn influx(&self) -> Option<&InfluxConfig> {
        match &self.backend {
            BackendConfig::Influx(config) => Some(config),
            _ => None,
        }
    }

    /// Prometheus settings, if Prometheus is the active backend.
    pub fn prometheus(&self) -> Option<&PrometheusConfig> {
        match &self.backend {
            BackendConfig::Prometheus(config) => Some(config),
            _ => None,
        }
    }

    /// TimescaleDB settings, if TimescaleDB is the active backend.
    pub fn timescale(&self) -> Option<&TimescaleConfig> {
        match &self.backend {
            BackendConfig::Timescale(config) => Some(config),
            _ => None,
        }
    }

    /// Hardware categories to poll.
    pub fn enabled_hardware(&self) -> &EnabledHardware {
        &self.enabled_hardware
    }

    /// Compiled hide rules.
    pub fn hidden_sensors(&self) -> &HiddenSensors {
        &self.hidden_sensors
    }

    /// Whether the sensor at `path` is excluded from export.
    pub fn is_hidden(&self, path: &str) -> bool {
        self.hidden_sensors.is_hidden(path)
    }

    /// Sensor aliases.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Display name configured for the sensor at `path`.
    pub fn try_get_alias(&self, path: &str) -> Option<&str> {
        self.aliases.try_get_alias(path)
    }

    /// Configured host name override.
    pub fn lookup_name_override(&self) -> Option<&str> {
        self.lookup_name_override.as_deref()
    }

    /// Host name reported with metrics: the override, or the OS host name.
    pub fn lookup_name(&self) -> String {
        if let Some(name) = &self.lookup_name_override {
            return name.clone();
        }
        match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Failed to read host name, using 'localhost': {}", e);
                "localhost".to_string()
            }
        }
    }
}

/// Single-pass resolver from settings to [`ResolvedConfig`].
pub struct ConfigResolver<'a> {
    trust_sink: &'a dyn TrustPolicySink,
}

impl<'a> ConfigResolver<'a> {
    /// Create a resolver installing trust policies into `trust_sink`.
    pub fn new(trust_sink: &'a dyn TrustPolicySink) -> Self {
        Self { trust_sink }
    }

    /// Resolve `settings`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from the individual steps; nothing is returned or
    /// installed on failure.
    pub fn resolve(&self, settings: &dyn Settings) -> Result<ResolvedConfig> {
        let interval = resolve_interval(settings)?;
        debug!("Interval: {}s", interval.as_secs());

        let mut enabled_hardware = resolve_enabled_hardware(settings)?;

        let backend = select_backend(settings)?;

        let hidden_sensors = HiddenSensors::from_settings(settings)?;
        for category in HardwareCategory::ALL {
            if enabled_hardware.is_enabled(category) && hidden_sensors.hides_category(category) {
                debug!("All {} sensors hidden, disabling category", category);
                enabled_hardware.set(category, false);
            }
        }

        let aliases = AliasTable::from_settings(settings)?;

        let lookup_name_override = settings
            .get(STATIC_NAME_KEY)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        if let Some(value) = settings.get(CERTIFICATE_VERIFICATION_KEY) {
            install_certificate_verification(value, settings.base_dir(), self.trust_sink)?;
        }

        info!(
            "Configuration resolved: backend={}, interval={}s, {} hide rules, {} aliases",
            backend.kind(),
            interval.as_secs(),
            hidden_sensors.len(),
            aliases.len()
        );
        for category in enabled_hardware.disabled() {
            info!("  {} monitoring disabled", category);
        }

        Ok(ResolvedConfig {
            interval,
            backend,
            enabled_hardware,
            hidden_sensors,
            aliases,
            lookup_name_override,
        })
    }
}

fn resolve_interval(settings: &dyn Settings) -> Result<Duration> {
    match get_parsed::<u64>(settings, INTERVAL_KEY)? {
        None => Ok(DEFAULT_INTERVAL),
        Some(0) => Err(ConfigError::parse(
            INTERVAL_KEY,
            settings.get(INTERVAL_KEY).unwrap_or_default(),
            "interval must be at least one second",
        )),
        Some(secs) => Ok(Duration::from_secs(secs)),
    }
}

fn resolve_enabled_hardware(settings: &dyn Settings) -> Result<EnabledHardware> {
    let mut enabled = EnabledHardware::default();
    for category in HardwareCategory::ALL {
        if settings.get_bool(&category.settings_key())? == Some(false) {
            enabled.set(category, false);
        }
    }
    Ok(enabled)
}

fn serialize_secs<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::TrustPolicy;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        installed: Mutex<Vec<TrustPolicy>>,
    }

    impl TrustPolicySink for RecordingSink {
        fn install(&self, policy: TrustPolicy) {
            self.installed.lock().unwrap().push(policy);
        }
    }

    fn resolve(pairs: &[(&str, &str)]) -> Result<ResolvedConfig> {
        let sink = RecordingSink::default();
        ConfigResolver::new(&sink).resolve(&SettingsMap::from_pairs(pairs.iter().copied()))
    }

    #[test]
    fn test_empty_settings() {
        let config = resolve(&[]).unwrap();

        let graphite = config.graphite().unwrap();
        assert_eq!(graphite.host, "localhost");
        assert_eq!(graphite.port, 2003);
        assert!(!graphite.tags);
        assert!(config.influx().is_none());
        assert!(config.prometheus().is_none());
        assert!(config.timescale().is_none());
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(*config.enabled_hardware(), EnabledHardware::default());
        assert!(config.hidden_sensors().is_empty());
        assert!(config.aliases().is_empty());
        assert_eq!(config.lookup_name_override(), None);
    }

    #[test]
    fn test_interval() {
        let config = resolve(&[("interval", "6")]).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(6));

        for bad in ["0", "-1", "5s", "soon"] {
            let err = resolve(&[("interval", bad)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Parse { ref key, .. } if key == "interval"),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_hardware_flags() {
        let config = resolve(&[
            ("hardware.cpu", "false"),
            ("hardware.network", "off"),
            ("hardware.ram", "true"),
        ])
        .unwrap();

        let enabled = config.enabled_hardware();
        assert!(!enabled.cpu);
        assert!(!enabled.network);
        assert!(enabled.ram);
        assert!(enabled.gpu);
        assert!(enabled.storage);

        assert!(resolve(&[("hardware.gpu", "nope")]).is_err());
    }

    #[test]
    fn test_full_hide_disables_category() {
        let config = resolve(&[("/nvme/*/hidden", "true"), ("/amdcpu/0/load/1/hidden", "true")])
            .unwrap();

        assert!(!config.enabled_hardware().storage);
        assert!(config.enabled_hardware().cpu);
        assert!(config.is_hidden("/nvme/0/temperature/0"));
        assert!(config.is_hidden("/amdcpu/0/load/1"));
        assert!(!config.is_hidden("/amdcpu/0/load/2"));
    }

    #[test]
    fn test_static_name() {
        let config = resolve(&[("static-name", "my-cool-machine")]).unwrap();
        assert_eq!(config.lookup_name(), "my-cool-machine");

        let config = resolve(&[("static-name", "")]).unwrap();
        assert_eq!(config.lookup_name_override(), None);
        assert!(!config.lookup_name().is_empty());
    }

    #[test]
    fn test_aliases() {
        let config = resolve(&[("/amdcpu/0/load/1/name", "CPU Core 0 T0")]).unwrap();
        assert_eq!(config.try_get_alias("/amdcpu/0/load/1"), Some("CPU Core 0 T0"));
        assert_eq!(config.try_get_alias("/amdcpu/0/load/3"), None);
    }

    #[test]
    fn test_certificate_policy_goes_to_sink() {
        let sink = RecordingSink::default();
        let settings = SettingsMap::from_pairs([("certificate-verification", "false")]);
        ConfigResolver::new(&sink).resolve(&settings).unwrap();
        assert_eq!(*sink.installed.lock().unwrap(), vec![TrustPolicy::AcceptAll]);
    }

    #[test]
    fn test_failed_resolution_installs_nothing() {
        let sink = RecordingSink::default();
        let settings = SettingsMap::from_pairs([
            ("certificate-verification", "false"),
            ("graphite.host", "a"),
            ("prometheus.host", "b"),
        ]);

        let err = ConfigResolver::new(&sink).resolve(&settings).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict { .. }));
        assert!(sink.installed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let pairs = [
            ("interval", "10"),
            ("influx.address", "http://localhost:8086"),
            ("/amdcpu/hidden", "*/clock/*;0/load/1-4"),
            ("/gpu-nvidia/*/hidden", ""),
            ("aliases", "/amdcpu/0/load/0=Total"),
            ("static-name", "box"),
        ];
        assert_eq!(resolve(&pairs).unwrap(), resolve(&pairs).unwrap());
    }

    #[test]
    fn test_serializes_interval_as_seconds() {
        let config = resolve(&[("interval", "7")]).unwrap();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["interval_secs"], 7);
        assert_eq!(json["backend"]["type"], "graphite");
    }
}
