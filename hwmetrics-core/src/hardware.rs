//! Hardware categories and the enabled-hardware flag set
//!
//! Sensor paths start with a hardware root such as `/amdcpu` or `/nvme`. Each
//! root belongs to one of a fixed set of categories that can be switched on or
//! off as a whole.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hardware subsystem category that can be enabled or disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareCategory {
    Cpu,
    Gpu,
    Motherboard,
    Controller,
    Network,
    Ram,
    Storage,
}

impl HardwareCategory {
    /// Every category, in settings order.
    pub const ALL: [HardwareCategory; 7] = [
        HardwareCategory::Cpu,
        HardwareCategory::Gpu,
        HardwareCategory::Motherboard,
        HardwareCategory::Controller,
        HardwareCategory::Network,
        HardwareCategory::Ram,
        HardwareCategory::Storage,
    ];

    /// Lowercase category name.
    pub fn name(&self) -> &'static str {
        match self {
            HardwareCategory::Cpu => "cpu",
            HardwareCategory::Gpu => "gpu",
            HardwareCategory::Motherboard => "motherboard",
            HardwareCategory::Controller => "controller",
            HardwareCategory::Network => "network",
            HardwareCategory::Ram => "ram",
            HardwareCategory::Storage => "storage",
        }
    }

    /// Settings key holding this category's enable flag.
    pub fn settings_key(&self) -> String {
        format!("hardware.{}", self.name())
    }

    /// Map a sensor path root (first path segment, without the slash) to its category.
    ///
    /// # Examples
    ///
    /// ```
    /// use hwmetrics_core::hardware::HardwareCategory;
    ///
    /// assert_eq!(HardwareCategory::from_root("amdcpu"), Some(HardwareCategory::Cpu));
    /// assert_eq!(HardwareCategory::from_root("nvidia-gpu"), Some(HardwareCategory::Gpu));
    /// assert_eq!(HardwareCategory::from_root("toaster"), None);
    /// ```
    pub fn from_root(root: &str) -> Option<Self> {
        match root.to_ascii_lowercase().as_str() {
            "cpu" | "amdcpu" | "intelcpu" | "genericcpu" => Some(HardwareCategory::Cpu),
            "gpu" | "nvidiagpu" | "nvidia-gpu" | "gpu-nvidia" | "atigpu" | "gpu-amd"
            | "amdgpu" | "gpu-intel" | "intelgpu" => Some(HardwareCategory::Gpu),
            "motherboard" | "mainboard" | "lpc" | "superio" | "embedded-controller" => {
                Some(HardwareCategory::Motherboard)
            }
            "controller" | "fancontroller" | "aquacomputer" | "heatmaster" | "tbalancer"
            | "nzxt" | "corsair" | "aeroquad" => Some(HardwareCategory::Controller),
            "network" | "nic" => Some(HardwareCategory::Network),
            "ram" | "memory" => Some(HardwareCategory::Ram),
            "storage" | "hdd" | "ssd" | "nvme" | "disk" => Some(HardwareCategory::Storage),
            _ => None,
        }
    }
}

impl fmt::Display for HardwareCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which hardware categories the exporter polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledHardware {
    pub cpu: bool,
    pub gpu: bool,
    pub motherboard: bool,
    pub controller: bool,
    pub network: bool,
    pub ram: bool,
    pub storage: bool,
}

impl Default for EnabledHardware {
    fn default() -> Self {
        Self {
            cpu: true,
            gpu: true,
            motherboard: true,
            controller: true,
            network: true,
            ram: true,
            storage: true,
        }
    }
}

impl EnabledHardware {
    /// Whether `category` is enabled.
    pub fn is_enabled(&self, category: HardwareCategory) -> bool {
        match category {
            HardwareCategory::Cpu => self.cpu,
            HardwareCategory::Gpu => self.gpu,
            HardwareCategory::Motherboard => self.motherboard,
            HardwareCategory::Controller => self.controller,
            HardwareCategory::Network => self.network,
            HardwareCategory::Ram => self.ram,
            HardwareCategory::Storage => self.storage,
        }
    }

    /// Enable or disable `category`.
    pub fn set(&mut self, category: HardwareCategory, enabled: bool) {
        let flag = match category {
            HardwareCategory::Cpu => &mut self.cpu,
            HardwareCategory::Gpu => &mut self.gpu,
            HardwareCategory::Motherboard => &mut self.motherboard,
            HardwareCategory::Controller => &mut self.controller,
            HardwareCategory::Network => &mut self.network,
            HardwareCategory::Ram => &mut self.ram,
            HardwareCategory::Storage => &mut self.storage,
        };
        *flag = enabled;
    }

    /// Categories that are currently disabled.
    pub fn disabled(&self) -> impl Iterator<Item = HardwareCategory> + '_ {
        HardwareCategory::ALL
            .into_iter()
            .filter(|c| !self.is_enabled(*c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_everything() {
        let enabled = EnabledHardware::default();
        for category in HardwareCategory::ALL {
            assert!(enabled.is_enabled(category), "{category} should be enabled");
        }
        assert_eq!(enabled.disabled().count(), 0);
    }

    #[test]
    fn test_set_single_category() {
        let mut enabled = EnabledHardware::default();
        enabled.set(HardwareCategory::Storage, false);

        assert!(!enabled.storage);
        assert!(enabled.cpu);
        assert_eq!(
            enabled.disabled().collect::<Vec<_>>(),
            vec![HardwareCategory::Storage]
        );
    }

    #[test]
    fn test_root_mapping_is_case_insensitive() {
        assert_eq!(
            HardwareCategory::from_root("IntelCPU"),
            Some(HardwareCategory::Cpu)
        );
        assert_eq!(HardwareCategory::from_root("lpc"), Some(HardwareCategory::Motherboard));
        assert_eq!(HardwareCategory::from_root("nic"), Some(HardwareCategory::Network));
        assert_eq!(HardwareCategory::from_root("nvme"), Some(HardwareCategory::Storage));
        assert_eq!(HardwareCategory::from_root("ram"), Some(HardwareCategory::Ram));
    }

    #[test]
    fn test_settings_key() {
        assert_eq!(HardwareCategory::Motherboard.settings_key(), "hardware.motherboard");
    }
}
