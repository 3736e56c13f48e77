use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::client::BATCH_LOOKUP_LIMIT;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
/// Library configurations
pub struct Config {
    /// Delay between two reconciliation passes
    pub reconcile_duration_in_secs: u64,
    /// Number of track ids per batched ISRC lookup
    pub lookup_batch_size: usize,
    /// Trailing-edge window for per-instance UI state refreshes
    pub debounce_duration_in_ms: u64,
    /// Location of the durable ISRC cache file.
    /// Defaults to a file under the user's cache directory.
    pub cache_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconcile_duration_in_secs: 30,
            lookup_batch_size: BATCH_LOOKUP_LIMIT,
            debounce_duration_in_ms: 50,
            cache_file: None,
        }
    }
}

impl Config {
    /// Parses configurations from a TOML file. Missing fields fall back to
    /// their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parse config file {}", path.display()))
    }

    pub fn reconcile_duration(&self) -> Duration {
        Duration::from_secs(self.reconcile_duration_in_secs)
    }

    pub fn debounce_duration(&self) -> Duration {
        Duration::from_millis(self.debounce_duration_in_ms)
    }
}
