//! In-memory channel-based event bus for standalone mode.
//!
//! Uses tokio broadcast channels for pub/sub within a single process.
//! Ideal for local development and testing without external dependencies.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info};

use super::{type_matches_any, EventBus, EventHandler, Result};
use crate::event::DomainEvent;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// In-memory event bus using tokio broadcast channels.
///
/// Events are published to a broadcast channel and received by all subscribers.
/// Type filtering is done on the subscriber side.
pub struct ChannelEventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
    /// Event type filters; empty accepts every type.
    type_filters: Vec<String>,
    handlers: Arc<RwLock<Vec<Box<dyn EventHandler>>>>,
    consuming: Arc<RwLock<bool>>,
}

impl ChannelEventBus {
    /// Create a new channel event bus with subscriber-side type filters.
    pub fn new(type_filters: Vec<String>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        info!(type_filters = ?type_filters, "Channel event bus initialized");

        Self {
            sender,
            type_filters,
            handlers: Arc::new(RwLock::new(Vec::new())),
            consuming: Arc::new(RwLock::new(false)),
        }
    }

    /// Create a publisher-only bus instance.
    pub fn publisher() -> Self {
        Self::new(Vec::new())
    }

    /// Create a bus that shares this channel but filters differently.
    pub fn with_filters(&self, type_filters: Vec<String>) -> Self {
        Self {
            sender: self.sender.clone(),
            type_filters,
            handlers: Arc::new(RwLock::new(Vec::new())),
            consuming: Arc::new(RwLock::new(false)),
        }
    }

    /// Receive every published event directly, bypassing handlers.
    pub fn receiver(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }

    async fn start_consuming_impl(&self) -> Result<()> {
        {
            let mut consuming = self.consuming.write().await;
            if *consuming {
                return Ok(());
            }
            *consuming = true;
        }

        let mut receiver = self.sender.subscribe();
        let handlers = self.handlers.clone();
        let type_filters = self.type_filters.clone();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if !type_matches_any(&event.event_type, &type_filters) {
                            continue;
                        }

                        debug!(event_type = %event.event_type, event_id = %event.id, "Received event via channel");

                        super::dispatch_to_handlers(&handlers, &event).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        error!(skipped = n, "Channel consumer lagged, skipped messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Channel closed, stopping consumer");
                        break;
                    }
                }
            }
        });

        info!(type_filters = ?self.type_filters, "Channel consumer started");

        Ok(())
    }
}

#[async_trait]
impl EventBus for ChannelEventBus {
    #[tracing::instrument(name = "bus.publish", skip_all, fields(event_type = %event.event_type))]
    async fn publish(&self, event: Arc<DomainEvent>) -> Result<()> {
        let event_id = event.id;
        match self.sender.send(event) {
            Ok(receivers) => {
                debug!(%event_id, receivers, "Published event to channel");
            }
            Err(_) => {
                debug!(%event_id, "Published event (no receivers)");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn EventHandler>) -> Result<()> {
        let count = {
            let mut handlers = self.handlers.write().await;
            handlers.push(handler);
            handlers.len()
        };

        info!(handler_count = count, "Handler subscribed to channel bus");

        Ok(())
    }

    async fn start_consuming(&self) -> Result<()> {
        self.start_consuming_impl().await
    }
}
