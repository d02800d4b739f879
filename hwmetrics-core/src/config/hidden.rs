//! Hidden sensor rules
//!
//! Built from settings keys ending in `/hidden`. The key without the suffix
//! is a root pattern; the value is either a flag (`true`, `false` or empty)
//! or a `;`-separated list of sub-patterns appended to the root:
//!
//! ```toml
//! "/amdcpu/0/load/1-2/hidden" = true
//! "/amdcpu/hidden" = "*/clock/*; 0/power/*"
//! "/intelcpu/hidden" = ""   # hides everything under /intelcpu
//! ```

use serde::Serialize;
use tracing::debug;

use super::settings::Settings;
use crate::error::{ConfigError, Result};
use crate::hardware::HardwareCategory;
use crate::pattern::PathPattern;

/// Key suffix marking a hide rule.
pub const HIDDEN_SUFFIX: &str = "/hidden";

/// Compiled set of hide rules, OR-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HiddenSensors {
    rules: Vec<PathPattern>,
}

impl HiddenSensors {
    /// Create a rule set from already compiled patterns.
    pub fn new(rules: Vec<PathPattern>) -> Self {
        Self { rules }
    }

    /// Compile every `<pattern>/hidden` entry in `settings`.
    pub fn from_settings(settings: &dyn Settings) -> Result<Self> {
        let mut rules = Vec::new();

        for key in settings.keys() {
            let Some(root) = key
                .strip_suffix(HIDDEN_SUFFIX)
                .filter(|root| root.starts_with('/'))
            else {
                continue;
            };
            let value = settings.get(key).unwrap_or_default();

            for raw in expand_rule(root, value) {
                let pattern = PathPattern::parse(&raw)
                    .map_err(|reason| ConfigError::parse(key, value, reason))?;
                debug!("Hiding sensors matching {}", pattern);
                rules.push(pattern);
            }
        }

        Ok(Self { rules })
    }

    /// Whether any rule matches `path`.
    pub fn is_hidden(&self, path: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(path))
    }

    /// Whether some rule hides everything under a hardware root of `category`.
    ///
    /// Only rules whose every segment after the root is `*` count. A rule with
    /// a wildcard root covers every category. Hiding part of a root never
    /// disables its category.
    pub fn hides_category(&self, category: HardwareCategory) -> bool {
        self.rules.iter().filter(|r| r.covers_whole_root()).any(|rule| {
            rule.root().is_any()
                || rule
                    .root()
                    .names()
                    .any(|name| HardwareCategory::from_root(name) == Some(category))
        })
    }

    /// Compiled rules in settings order.
    pub fn rules(&self) -> &[PathPattern] {
        &self.rules
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Turn one `/hidden` entry into pattern strings.
fn expand_rule(root: &str, value: &str) -> Vec<String> {
    let value = value.trim();

    if value.is_empty() || value.eq_ignore_ascii_case("true") {
        // A bare hardware root hides everything below it
        return if root.trim_matches('/').contains('/') {
            vec![root.to_string()]
        } else {
            vec![format!("{}/*", root.trim_end_matches('/'))]
        };
    }
    if value.eq_ignore_ascii_case("false") {
        debug!("Ignoring disabled hide rule for {}", root);
        return Vec::new();
    }

    value
        .split(';')
        .map(str::trim)
        .filter(|sub| !sub.is_empty())
        .map(|sub| format!("{}/{}", root.trim_end_matches('/'), sub.trim_start_matches('/')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::SettingsMap;

    fn rules(pairs: &[(&str, &str)]) -> HiddenSensors {
        HiddenSensors::from_settings(&SettingsMap::from_pairs(pairs.iter().copied())).unwrap()
    }

    #[test]
    fn test_flag_entries() {
        let hidden = rules(&[
            ("/amdcpu/0/load/1-2/hidden", "true"),
            ("/amdcpu/*/clock/*/hidden", ""),
            ("/nvidia-gpu/0/power/1/hidden", "TRUE"),
            ("/nvme/0/factor/power_cycles/hidden", "false"),
        ]);

        assert_eq!(hidden.len(), 3);
        assert!(hidden.is_hidden("/amdcpu/0/load/1"));
        assert!(hidden.is_hidden("/amdcpu/0/load/2"));
        assert!(!hidden.is_hidden("/amdcpu/0/load/3"));
        assert!(hidden.is_hidden("/amdcpu/1/clock/100"));
        assert!(hidden.is_hidden("/nvidia-gpu/0/power/1"));
        assert!(!hidden.is_hidden("/nvme/0/factor/power_cycles"));
    }

    #[test]
    fn test_sub_pattern_entries() {
        let hidden = rules(&[("/amdcpu/hidden", "0/load/1-2; */clock/* ;0/power/*;")]);

        assert_eq!(hidden.len(), 3);
        assert_eq!(hidden.rules()[0].as_str(), "/amdcpu/0/load/1-2");
        assert!(hidden.is_hidden("/amdcpu/0/power/1"));
        assert!(hidden.is_hidden("/amdcpu/3/clock/0"));
        assert!(!hidden.is_hidden("/amdcpu/0/load/3"));
        assert!(!hidden.hides_category(HardwareCategory::Cpu));
    }

    #[test]
    fn test_bare_root_hides_whole_category() {
        let hidden = rules(&[("/intelcpu/hidden", "")]);

        assert!(hidden.is_hidden("/intelcpu/0/temperature/3"));
        assert!(hidden.hides_category(HardwareCategory::Cpu));
        assert!(!hidden.hides_category(HardwareCategory::Gpu));
    }

    #[test]
    fn test_partial_hiding_keeps_category() {
        let hidden = rules(&[
            ("/amdcpu/0/*/*/hidden", "true"),
            ("/nvme/*/temperature/*/hidden", "true"),
        ]);

        assert!(!hidden.hides_category(HardwareCategory::Cpu));
        assert!(!hidden.hides_category(HardwareCategory::Storage));
    }

    #[test]
    fn test_wildcard_root_hides_every_category() {
        let hidden = rules(&[("/*/*/hidden", "true")]);
        for category in HardwareCategory::ALL {
            assert!(hidden.hides_category(category));
        }
    }

    #[test]
    fn test_alternative_roots() {
        let hidden = rules(&[("/gpu-nvidia,ram/*/hidden", "true")]);
        assert!(hidden.hides_category(HardwareCategory::Gpu));
        assert!(hidden.hides_category(HardwareCategory::Ram));
        assert!(!hidden.hides_category(HardwareCategory::Cpu));
    }

    #[test]
    fn test_ignores_unrelated_keys() {
        let hidden = rules(&[("graphite.hidden", "true"), ("/amdcpu/0/load/1/name", "x")]);
        assert!(hidden.is_empty());
    }

    #[test]
    fn test_bad_pattern_reports_key_and_value() {
        let settings = SettingsMap::from_pairs([("/amdcpu/hidden", "0/load/5-2")]);
        match HiddenSensors::from_settings(&settings) {
            Err(ConfigError::Parse { key, value, .. }) => {
                assert_eq!(key, "/amdcpu/hidden");
                assert_eq!(value, "0/load/5-2");
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }
}
