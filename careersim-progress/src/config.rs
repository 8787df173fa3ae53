//! Engine tuning loaded from the bundled `progress.json`.
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_PROGRESS_DATA: &str =
    include_str!("../../careersim-web/static/assets/data/progress.json");

/// Bounds for the optional periodic re-check.
pub const MIN_RECHECK_SECS: u32 = 15;
pub const MAX_RECHECK_SECS: u32 = 900;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_storage_key_prefix")]
    pub storage_key_prefix: String,
    #[serde(default)]
    pub periodic_recheck_secs: Option<u32>,
    #[serde(default = "default_true")]
    pub repropagate_local_completions: bool,
}

fn default_storage_key_prefix() -> String {
    String::from("careersim.progress")
}

const fn default_true() -> bool {
    true
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            storage_key_prefix: default_storage_key_prefix(),
            periodic_recheck_secs: None,
            repropagate_local_completions: true,
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_PROGRESS_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_config() -> Self {
        Self::load_from_static()
    }

    /// Parse a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Periodic re-check interval clamped to
    /// [`MIN_RECHECK_SECS`]..=[`MAX_RECHECK_SECS`]; `None` when disabled.
    #[must_use]
    pub fn recheck_interval(&self) -> Option<Duration> {
        self.periodic_recheck_secs
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(u64::from(secs.clamp(MIN_RECHECK_SECS, MAX_RECHECK_SECS))))
    }

    /// Storage key of the snapshot for `simulation_id`.
    #[must_use]
    pub fn storage_key(&self, simulation_id: &str) -> String {
        format!("{}.{simulation_id}", self.storage_key_prefix)
    }
}
