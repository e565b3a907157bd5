//! Messaging and event bus configuration types.

use serde::Deserialize;

/// Default `source` stamped on published events.
pub const DEFAULT_EVENT_SOURCE: &str = "dashboard-mgt";

/// Messaging type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessagingType {
    /// In-process broadcast channel (no external broker).
    #[default]
    Channel,
    /// AWS SNS topic for publishing, SQS queue for subscribing.
    SnsSqs,
}

/// Messaging configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    /// Messaging type discriminator.
    #[serde(rename = "type")]
    pub messaging_type: MessagingType,
    /// Source name stamped on every event this service publishes.
    pub source: String,
    /// Event types the inbound listener subscribes to (`#` for all, `Agency*` for a prefix).
    pub subscribe: Vec<String>,
    /// SNS/SQS-specific configuration.
    pub sns_sqs: SnsSqsSettings,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            messaging_type: MessagingType::Channel,
            source: DEFAULT_EVENT_SOURCE.to_string(),
            subscribe: vec!["#".to_string()],
            sns_sqs: SnsSqsSettings::default(),
        }
    }
}

/// SNS/SQS-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnsSqsSettings {
    /// AWS region. Uses the default provider chain if not set.
    pub region: Option<String>,
    /// Custom endpoint URL (for LocalStack).
    pub endpoint_url: Option<String>,
    /// Topic name events are published to.
    pub topic: String,
    /// Queue name the listener consumes from.
    pub queue: String,
    /// Visibility timeout in seconds for received messages.
    pub visibility_timeout_secs: i32,
    /// Max number of messages to receive in one poll.
    pub max_messages: i32,
    /// Long-poll wait time in seconds.
    pub wait_time_secs: i32,
}

impl Default for SnsSqsSettings {
    fn default() -> Self {
        Self {
            region: None,
            endpoint_url: None,
            topic: "dashboard-events".to_string(),
            queue: "dashboard-mgt-inbound".to_string(),
            visibility_timeout_secs: 30,
            max_messages: 10,
            wait_time_secs: 20,
        }
    }
}
