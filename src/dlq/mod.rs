//! Dead Letter Queue (DLQ) infrastructure.
//!
//! Messages that cannot be delivered end up here for operator review and
//! replay:
//! - change-record images that do not decode into their registered entity
//! - change events whose publish kept failing after the retry budget was spent
//! - inbound events that do not decode, or whose write kept failing
//!
//! A dead letter is never dropped silently. When no queue is configured the
//! log publisher writes an error-level structured line per message, which is
//! the operator surface in that mode.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{DlqConfig, DlqType};
use crate::event::DomainEvent;
use crate::storage::ChangeRecord;
use crate::utils::clock::unix_now;

/// Errors that can occur during DLQ operations.
#[derive(Debug, thiserror::Error)]
pub enum DlqError {
    #[error("DLQ not configured")]
    NotConfigured,

    #[error("Failed to publish to DLQ: {0}")]
    PublishFailed(String),
}

/// Why a message was dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The payload did not decode into the entity it names.
    Undecodable(String),
    /// Publishing kept failing until attempts ran out.
    PublishExhausted(String),
    /// Writing an inbound event kept failing until attempts ran out.
    ApplyExhausted(String),
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeadLetterReason::Undecodable(e) => write!(f, "Undecodable payload: {}", e),
            DeadLetterReason::PublishExhausted(e) => write!(f, "Publish failed: {}", e),
            DeadLetterReason::ApplyExhausted(e) => write!(f, "Apply failed: {}", e),
        }
    }
}

/// The undelivered message, unmodified for replay.
#[derive(Debug, Clone, PartialEq)]
pub enum DeadLetterPayload {
    /// A change record the trigger could not publish.
    Change(ChangeRecord),
    /// An inbound event the listener could not apply.
    Event(DomainEvent),
}

impl DeadLetterPayload {
    /// Change id or event id.
    pub fn id(&self) -> String {
        match self {
            DeadLetterPayload::Change(record) => record.event_id.clone(),
            DeadLetterPayload::Event(event) => event.id.to_string(),
        }
    }

    /// Table key of a change, or `source/type` of an event.
    pub fn subject(&self) -> String {
        match self {
            DeadLetterPayload::Change(record) => record.key.to_string(),
            DeadLetterPayload::Event(event) => format!("{}/{}", event.source, event.event_type),
        }
    }

    /// JSON body: the change image, or the whole event.
    pub fn body(&self) -> String {
        match self {
            DeadLetterPayload::Change(record) => record
                .image()
                .map(|item| Value::Object(item.clone()).to_string())
                .unwrap_or_default(),
            DeadLetterPayload::Event(event) => serde_json::to_string(event).unwrap_or_default(),
        }
    }

    pub fn as_change(&self) -> Option<&ChangeRecord> {
        match self {
            DeadLetterPayload::Change(record) => Some(record),
            DeadLetterPayload::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&DomainEvent> {
        match self {
            DeadLetterPayload::Event(event) => Some(event),
            DeadLetterPayload::Change(_) => None,
        }
    }
}

/// A message that could not be delivered.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub payload: DeadLetterPayload,
    /// Event type involved, when known.
    pub event_type: Option<String>,
    pub reason: DeadLetterReason,
    /// Delivery attempts made before giving up (0 when retrying cannot help).
    pub attempts: u32,
    /// Unix seconds when the message was dead-lettered.
    pub occurred_at: i64,
    /// Which component sent to DLQ.
    pub source_component: String,
}

impl DeadLetter {
    fn new(
        payload: DeadLetterPayload,
        event_type: Option<String>,
        reason: DeadLetterReason,
        attempts: u32,
        source_component: &str,
    ) -> Self {
        Self {
            payload,
            event_type,
            reason,
            attempts,
            occurred_at: unix_now(),
            source_component: source_component.to_string(),
        }
    }

    /// Dead letter for a change image that does not decode.
    pub fn undecodable(record: ChangeRecord, error: &str, source_component: &str) -> Self {
        Self::new(
            DeadLetterPayload::Change(record),
            None,
            DeadLetterReason::Undecodable(error.to_string()),
            0,
            source_component,
        )
    }

    /// Dead letter for a change event whose publish attempts ran out.
    pub fn publish_exhausted(
        record: ChangeRecord,
        event_type: &str,
        error: &str,
        attempts: u32,
        source_component: &str,
    ) -> Self {
        Self::new(
            DeadLetterPayload::Change(record),
            Some(event_type.to_string()),
            DeadLetterReason::PublishExhausted(error.to_string()),
            attempts,
            source_component,
        )
    }

    /// Dead letter for an inbound event whose data does not decode.
    pub fn undecodable_event(event: DomainEvent, error: &str, source_component: &str) -> Self {
        let event_type = Some(event.event_type.clone());
        Self::new(
            DeadLetterPayload::Event(event),
            event_type,
            DeadLetterReason::Undecodable(error.to_string()),
            0,
            source_component,
        )
    }

    /// Dead letter for an inbound event whose write attempts ran out.
    pub fn apply_exhausted(
        event: DomainEvent,
        error: &str,
        attempts: u32,
        source_component: &str,
    ) -> Self {
        let event_type = Some(event.event_type.clone());
        Self::new(
            DeadLetterPayload::Event(event),
            event_type,
            DeadLetterReason::ApplyExhausted(error.to_string()),
            attempts,
            source_component,
        )
    }
}

/// Trait for publishing undelivered messages to a dead letter queue.
#[async_trait]
pub trait DeadLetterPublisher: Send + Sync {
    /// Publish a dead letter to the queue.
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError>;

    /// Check if the publisher is configured and ready.
    fn is_configured(&self) -> bool {
        true
    }
}

/// No-op DLQ publisher that logs but doesn't actually send anywhere.
pub struct NoopDeadLetterPublisher;

#[async_trait]
impl DeadLetterPublisher for NoopDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        warn!(
            subject = %dead_letter.payload.subject(),
            id = %dead_letter.payload.id(),
            reason = %dead_letter.reason,
            source = %dead_letter.source_component,
            "DLQ not configured, logging dead letter"
        );
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// DLQ publisher that writes one error-level structured line per dead letter.
pub struct LogDeadLetterPublisher;

#[async_trait]
impl DeadLetterPublisher for LogDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        error!(
            subject = %dead_letter.payload.subject(),
            id = %dead_letter.payload.id(),
            event_type = dead_letter.event_type.as_deref().unwrap_or("-"),
            attempts = dead_letter.attempts,
            reason = %dead_letter.reason,
            source = %dead_letter.source_component,
            body = %dead_letter.payload.body(),
            "Dead-lettered message"
        );
        Ok(())
    }
}

/// In-memory DLQ publisher using a channel.
///
/// Used for standalone mode and testing.
pub struct ChannelDeadLetterPublisher {
    sender: mpsc::UnboundedSender<DeadLetter>,
}

impl ChannelDeadLetterPublisher {
    /// Create a new channel-based DLQ publisher.
    ///
    /// Returns the publisher and a receiver for consuming dead letters.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DeadLetter>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeadLetterPublisher for ChannelDeadLetterPublisher {
    async fn publish(&self, dead_letter: DeadLetter) -> Result<(), DlqError> {
        info!(
            subject = %dead_letter.payload.subject(),
            reason = %dead_letter.reason,
            "Publishing to channel DLQ"
        );
        self.sender
            .send(dead_letter)
            .map_err(|e| DlqError::PublishFailed(e.to_string()))
    }
}

/// Create a DLQ publisher based on configuration.
///
/// The channel type hands back its receiver so the caller can drain it; the
/// other types return `None`.
pub fn create_publisher(
    config: &DlqConfig,
) -> (
    Arc<dyn DeadLetterPublisher>,
    Option<mpsc::UnboundedReceiver<DeadLetter>>,
) {
    match config.dlq_type {
        DlqType::Log => {
            debug!("Using log DLQ publisher");
            (Arc::new(LogDeadLetterPublisher), None)
        }
        DlqType::Channel => {
            debug!("Using channel DLQ publisher");
            let (publisher, receiver) = ChannelDeadLetterPublisher::new();
            (Arc::new(publisher), Some(receiver))
        }
        DlqType::Noop => {
            debug!("No DLQ configured, using noop publisher");
            (Arc::new(NoopDeadLetterPublisher), None)
        }
    }
}
