//! Navigator configuration

use crate::error::Result;
use deep_link::ResolverConfig;
use flow_engine::DEFAULT_SNAPSHOT_VERSION;
use navigation::{CoordinatorConfig, DEFAULT_MAX_OVERLAY_DEPTH};
use serde::{Deserialize, Serialize};

/// Configuration for a [`Navigator`](crate::Navigator)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Deep link URL scheme
    pub scheme: String,
    /// Deep link host (`None` accepts any host and emits an empty one)
    pub host: Option<String>,
    /// Cap on nested overlays per tab (`None` for unbounded)
    pub max_overlay_depth: Option<usize>,
    /// Schema version of persisted flow snapshots
    pub snapshot_version: u32,
    /// Clear the target tab before replaying a deep link
    pub reset_tab_on_deep_link: bool,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            scheme: "app".to_string(),
            host: None,
            max_overlay_depth: Some(DEFAULT_MAX_OVERLAY_DEPTH),
            snapshot_version: DEFAULT_SNAPSHOT_VERSION,
            reset_tab_on_deep_link: true,
        }
    }
}

impl NavigatorConfig {
    /// Create a configuration for a URL scheme
    pub fn new(scheme: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), ..Default::default() }
    }

    /// Load from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the deep link host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the overlay depth cap
    pub fn max_overlay_depth(mut self, limit: Option<usize>) -> Self {
        self.max_overlay_depth = limit;
        self
    }

    /// Set the snapshot schema version
    pub fn snapshot_version(mut self, version: u32) -> Self {
        self.snapshot_version = version;
        self
    }

    /// Enable or disable clearing the target tab on deep links
    pub fn reset_tab_on_deep_link(mut self, reset: bool) -> Self {
        self.reset_tab_on_deep_link = reset;
        self
    }

    pub(crate) fn coordinator(&self) -> CoordinatorConfig {
        CoordinatorConfig::default().max_overlay_depth(self.max_overlay_depth)
    }

    pub(crate) fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            reset_tab: self.reset_tab_on_deep_link,
        }
    }
}
