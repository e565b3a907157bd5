//! Event bus for domain event delivery.
//!
//! This module contains:
//! - `EventBus` trait: publish domain events, subscribe handlers
//! - `EventHandler` trait: for processing received events
//! - Event type filtering shared by all backends
//! - Implementations: in-process channel, mock, AWS SNS/SQS

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::event::DomainEvent;

pub mod channel;
mod dispatch;
pub mod mock;
#[cfg(feature = "sns-sqs")]
pub mod sns_sqs;

pub use channel::ChannelEventBus;
pub use dispatch::{dispatch_to_handlers, process_message, DispatchResult};
pub use mock::MockEventBus;
#[cfg(feature = "sns-sqs")]
pub use sns_sqs::{SnsSqsConfig, SnsSqsEventBus};

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Handler '{name}' failed: {message}")]
    HandlerFailed { name: String, message: String },

    #[error("Subscribe not supported for this bus type")]
    SubscribeNotSupported,
}

/// Handler for processing events from the bus.
pub trait EventHandler: Send + Sync {
    /// Process one domain event.
    fn handle(&self, event: Arc<DomainEvent>) -> BoxFuture<'static, Result<()>>;
}

/// Interface for domain event delivery.
///
/// Implementations:
/// - `ChannelEventBus`: in-process tokio broadcast
/// - `MockEventBus`: records publishes, injects failures
/// - `SnsSqsEventBus`: SNS topic publish, SQS queue consume
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event. The event is shared immutably with every consumer.
    async fn publish(&self, event: Arc<DomainEvent>) -> Result<()>;

    /// Register a handler for received events.
    async fn subscribe(&self, handler: Box<dyn EventHandler>) -> Result<()>;

    /// Start delivering received events to subscribed handlers.
    async fn start_consuming(&self) -> Result<()> {
        Ok(())
    }
}

/// Check if an event type matches a filter pattern.
///
/// Matching rules:
/// - "#" matches every type
/// - "Agency*" matches every type starting with "Agency"
/// - anything else is an exact match
pub fn type_matches(event_type: &str, filter: &str) -> bool {
    if filter == "#" {
        return true;
    }
    match filter.strip_suffix('*') {
        Some(prefix) => event_type.starts_with(prefix),
        None => event_type == filter,
    }
}

/// Check if an event type matches any of the filters. No filters matches all.
pub fn type_matches_any(event_type: &str, filters: &[String]) -> bool {
    filters.is_empty() || filters.iter().any(|f| type_matches(event_type, f))
}
