//! Timeline ordering configuration.

use serde::Deserialize;

/// Retry policy for persisting spliced timeline entries.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Retries after the first failed persist. Zero disables retrying.
    pub persist_retries: usize,
    /// Initial backoff delay in milliseconds.
    pub persist_min_delay_ms: u64,
    /// Upper bound on the backoff delay in milliseconds.
    pub persist_max_delay_ms: u64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            persist_retries: 5,
            persist_min_delay_ms: 50,
            persist_max_delay_ms: 2000,
        }
    }
}
