//! Retry utilities: backoff builders for storage writes.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::TimelineConfig;

/// Backoff for persisting spliced timeline entries.
///
/// Delays and attempt count come from [`TimelineConfig`]. Jitter enabled.
pub fn persist_backoff(config: &TimelineConfig) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(config.persist_min_delay_ms))
        .with_max_delay(Duration::from_millis(config.persist_max_delay_ms))
        .with_max_times(config.persist_retries)
        .with_jitter()
}
