//! Default settings file location
//!
//! Uses the XDG config directory when available.

use std::path::PathBuf;

/// Returns the default path for the settings file.
///
/// - Linux/macOS: `~/.config/hwmetrics/config.toml`
/// - Fallback: `/etc/hwmetrics/config.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("hwmetrics")
        .join("config.toml")
}
