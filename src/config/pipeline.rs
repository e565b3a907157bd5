//! Change-feed consumer, inbound listener and dead-letter configuration.

use serde::Deserialize;

/// Default publish attempts per change record (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Change-feed consumer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Publish attempts per change record before dead-lettering.
    pub max_attempts: u32,
    /// Backoff floor between attempts, in milliseconds.
    pub min_delay_ms: u64,
    /// Backoff ceiling between attempts, in milliseconds.
    pub max_delay_ms: u64,
    /// Max records handed to the consumer at once by the feed pump.
    pub batch_size: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay_ms: 50,
            max_delay_ms: 2_000,
            batch_size: 100,
        }
    }
}

/// Inbound listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Drop events whose `source` is this service's own source.
    pub ignore_own_source: bool,
    /// Apply attempts per inbound event before dead-lettering.
    pub max_attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            ignore_own_source: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            min_delay_ms: 50,
            max_delay_ms: 2_000,
        }
    }
}

/// Dead-letter destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DlqType {
    /// Error-level structured log line per dead letter.
    #[default]
    Log,
    /// In-process channel (standalone mode, tests).
    Channel,
    /// Warn and drop; reports itself as unconfigured.
    Noop,
}

/// Dead-letter configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DlqConfig {
    #[serde(rename = "type")]
    pub dlq_type: DlqType,
}
