//! Versioned compliance policy configuration.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ComplianceError;

/// Singleton-per-time compliance policy.
///
/// Exactly one config row is active at a time; updates deactivate the prior
/// row and insert a new one with a higher version. Rows are never mutated
/// in place, so the version doubles as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceConfig {
    /// Monotonically increasing config version.
    pub version: i64,

    /// Length of the rolling firearm purchase window, in days.
    pub firearm_window_days: u32,

    /// Maximum firearm quantity within the window before a hold applies.
    pub firearm_limit_per_window: u32,

    /// Enables the rolling-window multi-firearm hold.
    pub multi_firearm_hold_enabled: bool,

    /// Enables the FFL-on-file hold for firearm/FFL carts.
    pub ffl_hold_enabled: bool,

    /// True for the single currently-active row.
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

impl ComplianceConfig {
    /// A conservative default policy: both holds enabled, 5 firearms per
    /// 30 days.
    pub fn default_policy() -> Self {
        Self {
            version: 1,
            firearm_window_days: 30,
            firearm_limit_per_window: 5,
            multi_firearm_hold_enabled: true,
            ffl_hold_enabled: true,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Start of the rolling window ending at `now`. Orders created at
    /// exactly this instant are inside the window.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.firearm_window_days))
    }
}

/// Source of the active compliance config (implemented by the store).
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Loads the currently-active config.
    async fn active_config(&self) -> Result<ComplianceConfig, ComplianceError>;
}

/// Explicitly-invalidated read-through cache for the active config.
///
/// The active config is read on every checkout but changes rarely. The
/// cache holds one entry keyed by config version; `invalidate` must be
/// called after a config update so the next read goes back to the source.
#[derive(Debug, Default)]
pub struct ConfigCache {
    cached: RwLock<Option<Arc<ComplianceConfig>>>,
}

impl ConfigCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached active config, reading through to `source` on a
    /// miss.
    pub async fn get(
        &self,
        source: &dyn ConfigSource,
    ) -> Result<Arc<ComplianceConfig>, ComplianceError> {
        if let Some(config) = self.cached.read().await.as_ref() {
            return Ok(config.clone());
        }

        let mut slot = self.cached.write().await;
        // Another reader may have filled the slot while we waited.
        if let Some(config) = slot.as_ref() {
            return Ok(config.clone());
        }

        let config = Arc::new(source.active_config().await?);
        tracing::debug!(version = config.version, "compliance config loaded");
        *slot = Some(config.clone());
        Ok(config)
    }

    /// Drops the cached entry; the next `get` re-reads the source.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }

    /// Returns the version of the cached entry, if any.
    pub async fn cached_version(&self) -> Option<i64> {
        self.cached.read().await.as_ref().map(|c| c.version)
    }
}
