//! Retry backoff builders.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::config::{ListenerConfig, TriggerConfig};

/// `max_attempts` counts the first try, so the builder allows
/// `max_attempts - 1` retries.
fn attempts_backoff(max_attempts: u32, min_delay_ms: u64, max_delay_ms: u64) -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(min_delay_ms))
        .with_max_delay(Duration::from_millis(max_delay_ms))
        .with_max_times(max_attempts.saturating_sub(1) as usize)
        .with_jitter()
}

/// Backoff for event-bus publishes from the change-feed consumer.
pub fn publish_backoff(config: &TriggerConfig) -> ExponentialBuilder {
    attempts_backoff(config.max_attempts, config.min_delay_ms, config.max_delay_ms)
}

/// Backoff for applying inbound events to the table.
pub fn apply_backoff(config: &ListenerConfig) -> ExponentialBuilder {
    attempts_backoff(config.max_attempts, config.min_delay_ms, config.max_delay_ms)
}

#[cfg(test)]
mod tests {
    use backon::BackoffBuilder;

    use super::*;

    #[test]
    fn test_publish_backoff_counts_first_attempt() {
        let config = TriggerConfig {
            max_attempts: 3,
            ..TriggerConfig::default()
        };
        assert_eq!(publish_backoff(&config).build().count(), 2);
    }

    #[test]
    fn test_single_attempt_means_no_retries() {
        let config = TriggerConfig {
            max_attempts: 1,
            ..TriggerConfig::default()
        };
        assert_eq!(publish_backoff(&config).build().count(), 0);
    }

    #[test]
    fn test_apply_backoff_counts_first_attempt() {
        assert_eq!(apply_backoff(&ListenerConfig::default()).build().count(), 2);
    }
}
