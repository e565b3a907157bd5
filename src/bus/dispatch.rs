//! Handler dispatch utilities.
//!
//! Common patterns for dispatching domain events to registered handlers.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::error;

use super::EventHandler;
use crate::event::DomainEvent;

/// Dispatch an event to all registered handlers.
///
/// Calls each handler in sequence, logging errors but continuing to subsequent
/// handlers. Returns `true` if all handlers succeeded, `false` if any failed.
pub async fn dispatch_to_handlers(
    handlers: &Arc<RwLock<Vec<Box<dyn EventHandler>>>>,
    event: &Arc<DomainEvent>,
) -> bool {
    let handlers_guard = handlers.read().await;
    let mut all_succeeded = true;

    for handler in handlers_guard.iter() {
        if let Err(e) = handler.handle(Arc::clone(event)).await {
            error!(event_type = %event.event_type, event_id = %event.id, error = %e, "Handler failed");
            all_succeeded = false;
        }
    }

    all_succeeded
}

/// Result of processing a message through handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchResult {
    /// All handlers succeeded, safe to acknowledge.
    Success,
    /// One or more handlers failed, consider retry.
    HandlerFailed,
    /// Message could not be decoded, no retry will help.
    DecodeError,
    /// Event type is outside the subscription filters.
    Filtered,
}

impl DispatchResult {
    /// Returns true if the message should be acknowledged (removed from queue).
    ///
    /// Decode errors are acked to prevent infinite redelivery of bad messages.
    pub fn should_ack(&self) -> bool {
        !matches!(self, Self::HandlerFailed)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Process a JSON message body through handlers.
///
/// Decode, filter on event type, dispatch, and report the ack decision.
pub async fn process_message(
    body: &str,
    filters: &[String],
    handlers: &Arc<RwLock<Vec<Box<dyn EventHandler>>>>,
) -> DispatchResult {
    let event: DomainEvent = match serde_json::from_str(body) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to decode domain event");
            return DispatchResult::DecodeError;
        }
    };

    if !super::type_matches_any(&event.event_type, filters) {
        return DispatchResult::Filtered;
    }

    if dispatch_to_handlers(handlers, &Arc::new(event)).await {
        DispatchResult::Success
    } else {
        DispatchResult::HandlerFailed
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;
    use serde_json::json;

    use super::*;
    use crate::bus::BusError;

    struct SuccessHandler;
    impl EventHandler for SuccessHandler {
        fn handle(&self, _event: Arc<DomainEvent>) -> BoxFuture<'static, Result<(), BusError>> {
            Box::pin(async { Ok(()) })
        }
    }

    struct FailHandler;
    impl EventHandler for FailHandler {
        fn handle(&self, _event: Arc<DomainEvent>) -> BoxFuture<'static, Result<(), BusError>> {
            Box::pin(async {
                Err(BusError::HandlerFailed {
                    name: "test".to_string(),
                    message: "test failure".to_string(),
                })
            })
        }
    }

    fn handlers(list: Vec<Box<dyn EventHandler>>) -> Arc<RwLock<Vec<Box<dyn EventHandler>>>> {
        Arc::new(RwLock::new(list))
    }

    fn body(event_type: &str) -> String {
        serde_json::to_string(&DomainEvent::new(event_type, "upstream", json!({}))).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_mixed() {
        let handlers = handlers(vec![
            Box::new(SuccessHandler),
            Box::new(FailHandler),
            Box::new(SuccessHandler),
        ]);
        let event = Arc::new(DomainEvent::new("AgencyCreated", "upstream", json!({})));

        assert!(!dispatch_to_handlers(&handlers, &event).await);
    }

    #[test]
    fn test_dispatch_result_should_ack() {
        assert!(DispatchResult::Success.should_ack());
        assert!(DispatchResult::DecodeError.should_ack());
        assert!(DispatchResult::Filtered.should_ack());
        assert!(!DispatchResult::HandlerFailed.should_ack());
    }

    #[tokio::test]
    async fn test_process_message_decode_error() {
        let handlers = handlers(vec![Box::new(SuccessHandler)]);
        let result = process_message("not json", &[], &handlers).await;
        assert_eq!(result, DispatchResult::DecodeError);
    }

    #[tokio::test]
    async fn test_process_message_filters_by_type() {
        let handlers = handlers(vec![Box::new(FailHandler)]);
        let filters = vec!["Agency*".to_string()];

        let result = process_message(&body("RoomCreated"), &filters, &handlers).await;
        assert_eq!(result, DispatchResult::Filtered);

        let result = process_message(&body("AgencyCreated"), &filters, &handlers).await;
        assert_eq!(result, DispatchResult::HandlerFailed);
    }

    #[tokio::test]
    async fn test_process_message_success() {
        let handlers = handlers(vec![Box::new(SuccessHandler)]);
        let result = process_message(&body("AgencyCreated"), &[], &handlers).await;
        assert!(result.is_success());
    }
}
