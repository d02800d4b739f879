//! hwmetrics Core Library
//!
//! Configuration subsystem of the hwmetrics hardware sensor exporter: resolves
//! raw settings into a typed [`ResolvedConfig`], matches sensor paths against
//! hide rules and aliases, and installs the TLS trust policy used by backend
//! clients.

pub mod config;
pub mod error;
pub mod hardware;
pub mod pattern;
pub mod tls;

// Re-export commonly used types
pub use config::{
    default_config_path, AliasTable, BackendConfig, BackendKind, ConfigResolver, HiddenSensors,
    ResolvedConfig, Settings, SettingsMap,
};
pub use error::*;
pub use hardware::{EnabledHardware, HardwareCategory};
pub use pattern::PathPattern;
pub use tls::{GlobalTrustPolicy, TrustPolicy, TrustPolicySink};
