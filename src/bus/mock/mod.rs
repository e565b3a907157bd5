//! Mock event bus implementation for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BusError, EventBus, EventHandler, Result};
use crate::event::DomainEvent;

/// Mock event bus for testing.
///
/// Records every successful publish. Failures can be injected permanently
/// (`set_fail_on_publish`) or for the next N publishes (`fail_next`).
#[derive(Default)]
pub struct MockEventBus {
    published: RwLock<Vec<DomainEvent>>,
    fail_on_publish: RwLock<bool>,
    fail_remaining: AtomicU32,
    attempts: AtomicU32,
}

impl MockEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_publish(&self, fail: bool) {
        *self.fail_on_publish.write().await = fail;
    }

    /// Fail the next `count` publishes, then succeed.
    pub fn fail_next(&self, count: u32) {
        self.fail_remaining.store(count, Ordering::SeqCst);
    }

    /// Publish calls made, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn published_count(&self) -> usize {
        self.published.read().await.len()
    }

    pub async fn published(&self) -> Vec<DomainEvent> {
        self.published.read().await.clone()
    }

    pub async fn take_published(&self) -> Vec<DomainEvent> {
        std::mem::take(&mut *self.published.write().await)
    }
}

#[async_trait]
impl EventBus for MockEventBus {
    async fn publish(&self, event: Arc<DomainEvent>) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_on_publish.read().await {
            return Err(BusError::Connection("Mock publish failure".to_string()));
        }
        let injected = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(BusError::Publish("Mock transient failure".to_string()));
        }
        self.published.write().await.push((*event).clone());
        Ok(())
    }

    async fn subscribe(&self, _handler: Box<dyn EventHandler>) -> Result<()> {
        Err(BusError::SubscribeNotSupported)
    }
}
