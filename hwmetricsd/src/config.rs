//! Runtime configuration management
//!
//! Holds the resolved configuration behind a lock so it can be swapped
//! wholesale on reload while readers keep their own `Arc` snapshot. The
//! process-wide trust policy is replaced together with the configuration, so
//! it always reflects the active settings file.

use hwmetrics_core::{
    ConfigResolver, GlobalTrustPolicy, ResolvedConfig, Result, SettingsMap, TrustPolicy,
    TrustPolicySink,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Holds the policy a resolution asked for until the result is committed.
#[derive(Default)]
struct PendingTrustPolicy {
    policy: Mutex<Option<TrustPolicy>>,
}

impl PendingTrustPolicy {
    /// Requested policy, or the system default when none was configured.
    fn into_policy(self) -> TrustPolicy {
        self.policy
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .unwrap_or_default()
    }
}

impl TrustPolicySink for PendingTrustPolicy {
    fn install(&self, policy: TrustPolicy) {
        let mut pending = self
            .policy
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending = Some(policy);
    }
}

/// Resolved configuration plus the settings file it came from.
pub(crate) struct RuntimeConfig {
    /// Settings file, re-read on every reload
    path: PathBuf,

    /// Current configuration snapshot
    current: RwLock<Arc<ResolvedConfig>>,
}

impl RuntimeConfig {
    /// Load and resolve the settings file.
    ///
    /// Fails if the file is missing or does not resolve; there is no default
    /// configuration to fall back to at startup.
    pub async fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let (config, policy) = Self::resolve(path)?;
        GlobalTrustPolicy.install(policy);

        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Re-read the settings file and replace the current configuration.
    ///
    /// On error the previous configuration and trust policy stay active.
    pub async fn reload(&self) -> Result<Arc<ResolvedConfig>> {
        debug!("Reloading configuration from: {}", self.path.display());
        let (config, policy) = Self::resolve(&self.path)?;
        let config = Arc::new(config);

        let mut current = self.current.write().await;
        GlobalTrustPolicy.install(policy);
        *current = config.clone();
        Ok(config)
    }

    /// Current configuration snapshot.
    pub async fn current(&self) -> Arc<ResolvedConfig> {
        self.current.read().await.clone()
    }

    /// Settings file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn resolve(path: &Path) -> Result<(ResolvedConfig, TrustPolicy)> {
        let settings = SettingsMap::load(path)?;
        let pending = PendingTrustPolicy::default();
        let config = ConfigResolver::new(&pending).resolve(&settings)?;
        Ok((config, pending.into_policy()))
    }
}
