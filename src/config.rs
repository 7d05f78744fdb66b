//! Runtime configuration for the filesystem core.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CloudFsError, Result};

/// Tunables for the filesystem core.
///
/// All fields have defaults, so a config can be deserialized from a
/// partial JSON document or built with `CloudFsConfig::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudFsConfig {
    /// Interval between directory poll cycles, in milliseconds.
    pub poll_interval_ms: u64,
    /// Buffer size used by the whole-file read convenience helpers.
    pub read_buffer_size: usize,
}

impl Default for CloudFsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            read_buffer_size: 64 * 1024,
        }
    }
}

impl CloudFsConfig {
    /// Parse a configuration from a JSON document.
    ///
    /// Unknown fields are ignored; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CloudFsError::InvalidArgument(e.to_string()))
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
