//! Inbound event listener.
//!
//! Applies domain events published by other services to the shared table.
//! Each accepted event becomes an entity write stamped with the event's own
//! timestamp as oplock and marked `latched`, so the write races local writes
//! purely on the producer's clock.
//!
//! Events arriving from the bus go through `Listener::deliver`: storage
//! failures are retried with backoff, and an event that still cannot be
//! written, or whose data does not decode, is dead-lettered.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backon::Retryable;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bus::{BusError, EventHandler};
use crate::config::ListenerConfig;
use crate::dlq::{DeadLetter, DeadLetterPublisher, DlqError, LogDeadLetterPublisher};
use crate::entity::{decode, Agency, CodecError, Entity};
use crate::event::{event_type, DomainEvent, EventAction};
use crate::guard::{WriteGuard, WriteOutcome};
use crate::storage::StorageError;
use crate::utils::retry::apply_backoff;

/// Component name on dead letters.
const COMPONENT: &str = "listener";

/// Errors applying an inbound event.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("Event data is not an object")]
    InvalidData,

    #[error("Event data does not decode: {0}")]
    Decode(#[from] CodecError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to dead-letter event {event_id}: {source}")]
    DeadLetter {
        event_id: String,
        #[source]
        source: DlqError,
    },
}

impl ListenerError {
    /// Only storage failures can succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ListenerError::Storage(_))
    }
}

pub type Result<T> = std::result::Result<T, ListenerError>;

/// What the listener did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerOutcome {
    Applied(WriteOutcome),
    Ignored,
    DeadLettered,
}

/// Applies one inbound event type.
#[async_trait]
pub trait InboundApplier: Send + Sync {
    async fn apply(&self, guard: &WriteGuard, event: &DomainEvent) -> Result<WriteOutcome>;
}

/// Writes the event data as an `E`, stamped with the event timestamp and
/// latched.
pub struct EntityCreatedApplier<E>(PhantomData<fn() -> E>);

impl<E> EntityCreatedApplier<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for EntityCreatedApplier<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: Entity> InboundApplier for EntityCreatedApplier<E> {
    async fn apply(&self, guard: &WriteGuard, event: &DomainEvent) -> Result<WriteOutcome> {
        let Value::Object(data) = &event.data else {
            return Err(ListenerError::InvalidData);
        };
        let mut entity: E = decode(data)?;
        let meta = entity.meta_mut();
        meta.oplock = Some(event.timestamp);
        meta.latched = Some(true);
        Ok(guard.write_entity(&entity).await?)
    }
}

/// Event type to applier map, built once at startup.
#[derive(Clone, Default)]
pub struct InboundRegistry {
    appliers: HashMap<String, Arc<dyn InboundApplier>>,
}

impl InboundRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agencies are the only entity synced from upstream.
    pub fn standard() -> Self {
        Self::new().with_created::<Agency>()
    }

    /// Apply `<Entity>Created` events for `E`.
    pub fn with_created<E: Entity>(self) -> Self {
        self.with_applier(
            event_type(E::KIND, EventAction::Created),
            Arc::new(EntityCreatedApplier::<E>::new()),
        )
    }

    pub fn with_applier(
        mut self,
        event_type: impl Into<String>,
        applier: Arc<dyn InboundApplier>,
    ) -> Self {
        self.appliers.insert(event_type.into(), applier);
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&Arc<dyn InboundApplier>> {
        self.appliers.get(event_type)
    }

    /// Registered event types, for bus subscription filters.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.appliers.keys().cloned().collect();
        types.sort();
        types
    }
}

/// The inbound event listener.
pub struct Listener {
    guard: WriteGuard,
    registry: InboundRegistry,
    config: ListenerConfig,
    own_source: String,
    dlq: Arc<dyn DeadLetterPublisher>,
}

impl Listener {
    pub fn new(
        guard: WriteGuard,
        registry: InboundRegistry,
        config: ListenerConfig,
        own_source: impl Into<String>,
    ) -> Self {
        Self {
            guard,
            registry,
            config,
            own_source: own_source.into(),
            dlq: Arc::new(LogDeadLetterPublisher),
        }
    }

    /// Send undeliverable events to `dlq` instead of the error log.
    pub fn with_dead_letters(mut self, dlq: Arc<dyn DeadLetterPublisher>) -> Self {
        self.dlq = dlq;
        self
    }

    pub fn registry(&self) -> &InboundRegistry {
        &self.registry
    }

    /// Apply one inbound event. Unknown types and this service's own events
    /// are ignored.
    pub async fn on_event(&self, event: &DomainEvent) -> Result<ListenerOutcome> {
        if self.config.ignore_own_source && event.source == self.own_source {
            debug!(event = %event, "Ignoring own event");
            return Ok(ListenerOutcome::Ignored);
        }
        let Some(applier) = self.registry.get(&event.event_type) else {
            debug!(event = %event, "Ignoring unknown event type");
            return Ok(ListenerOutcome::Ignored);
        };

        let outcome = applier.apply(&self.guard, event).await?;
        info!(
            event = %event,
            source = %event.source,
            committed = outcome.is_committed(),
            "Applied inbound event"
        );
        Ok(ListenerOutcome::Applied(outcome))
    }

    /// Apply one event from the bus, retrying storage failures up to
    /// `max_attempts` and dead-lettering what still fails. Only a failure to
    /// dead-letter is returned as an error.
    pub async fn deliver(&self, event: &DomainEvent) -> Result<ListenerOutcome> {
        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let applied = (|| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            self.on_event(event).await
        })
        .retry(apply_backoff(&self.config))
        .when(ListenerError::is_retryable)
        .notify(|err: &ListenerError, dur: Duration| {
            warn!(event = %event, error = %err, delay = ?dur, "Inbound event failed, retrying");
        })
        .await;

        let dead_letter = match applied {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() => DeadLetter::apply_exhausted(
                event.clone(),
                &e.to_string(),
                attempts.load(Ordering::SeqCst),
                COMPONENT,
            ),
            Err(e) => DeadLetter::undecodable_event(event.clone(), &e.to_string(), COMPONENT),
        };

        warn!(event = %event, reason = %dead_letter.reason, "Dead-lettering inbound event");
        let event_id = event.id.to_string();
        self.dlq
            .publish(dead_letter)
            .await
            .map_err(|source| ListenerError::DeadLetter { event_id, source })?;
        Ok(ListenerOutcome::DeadLettered)
    }
}

/// Adapts a `Listener` to the bus handler seam.
pub struct ListenerHandler {
    listener: Arc<Listener>,
}

impl ListenerHandler {
    pub fn new(listener: Arc<Listener>) -> Self {
        Self { listener }
    }
}

impl EventHandler for ListenerHandler {
    fn handle(
        &self,
        event: Arc<DomainEvent>,
    ) -> BoxFuture<'static, std::result::Result<(), BusError>> {
        let listener = self.listener.clone();
        Box::pin(async move {
            listener.deliver(&event).await.map(|_| ()).map_err(|e| {
                warn!(event = %event, error = %e, "Inbound event failed");
                BusError::HandlerFailed {
                    name: "listener".to_string(),
                    message: e.to_string(),
                }
            })
        })
    }
}
