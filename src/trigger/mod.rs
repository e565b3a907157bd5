//! Change-feed consumer.
//!
//! Turns committed table changes into published domain events:
//! - INSERT → `<Entity>Created` from the new image
//! - MODIFY → `<Entity>Updated` from the new image
//! - REMOVE → `<Entity>Deleted` from the old image (new image if absent)
//!
//! Unknown discriminators are ignored. Publishing is retried with
//! exponential backoff; a record that still cannot be published, or whose
//! image does not decode, is dead-lettered. Only a failure to dead-letter
//! fails the batch, handing it back to the platform for redelivery.
//!
//! Records for the same table key are processed in feed order; different
//! keys are processed concurrently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::bus::{BusError, EventBus};
use crate::config::TriggerConfig;
use crate::dlq::{DeadLetter, DeadLetterPublisher, DlqError};
use crate::entity::{EntityKind, TableKey};
use crate::event::{event_type, DomainEvent, EventAction};
use crate::storage::{parse_stream_batch, ChangeFeedError, ChangeRecord};
use crate::utils::retry::publish_backoff;

mod pump;
mod registry;

pub use pump::FeedPump;
pub use registry::{EntityEvents, EventMapper, EventRegistry};

/// Component name on dead letters.
const COMPONENT: &str = "trigger";

/// Errors that fail a whole batch.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("Invalid change batch: {0}")]
    Feed(#[from] ChangeFeedError),

    #[error("Failed to dead-letter change {event_id}: {source}")]
    DeadLetter {
        event_id: String,
        #[source]
        source: DlqError,
    },
}

pub type Result<T> = std::result::Result<T, TriggerError>;

/// What happened to one change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Published,
    Ignored,
    DeadLettered,
}

/// Per-batch tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub published: usize,
    pub ignored: usize,
    pub dead_lettered: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Published => self.published += 1,
            RecordOutcome::Ignored => self.ignored += 1,
            RecordOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.published += other.published;
        self.ignored += other.ignored;
        self.dead_lettered += other.dead_lettered;
    }

    pub fn total(&self) -> usize {
        self.published + self.ignored + self.dead_lettered
    }
}

/// Result of mapping one record, before publishing.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    /// No registered mapper for the record's discriminator, or no image.
    Ignored,
    /// The image does not decode into its registered entity.
    Undecodable(String),
    Event(DomainEvent),
}

/// The change-feed consumer.
pub struct Trigger {
    registry: Arc<EventRegistry>,
    bus: Arc<dyn EventBus>,
    dlq: Arc<dyn DeadLetterPublisher>,
    source: String,
    config: TriggerConfig,
}

impl Trigger {
    pub fn new(
        registry: Arc<EventRegistry>,
        bus: Arc<dyn EventBus>,
        dlq: Arc<dyn DeadLetterPublisher>,
        source: impl Into<String>,
        config: TriggerConfig,
    ) -> Self {
        Self {
            registry,
            bus,
            dlq,
            source: source.into(),
            config,
        }
    }

    /// Map a change record to the event it should publish.
    pub fn map_record(&self, record: &ChangeRecord) -> Mapping {
        let Some(discriminator) = record.discriminator() else {
            return Mapping::Ignored;
        };
        let (Some(mapper), Some(image)) = (self.registry.get(discriminator), record.image())
        else {
            return Mapping::Ignored;
        };

        match mapper.event_data(image) {
            Ok(data) => Mapping::Event(DomainEvent::for_change(
                &record.event_id,
                event_type(mapper.kind(), EventAction::from_change(record.kind)),
                &self.source,
                record.approximate_creation,
                data,
            )),
            Err(e) => Mapping::Undecodable(e.to_string()),
        }
    }

    /// Handle one change record.
    pub async fn handle_record(&self, record: ChangeRecord) -> Result<RecordOutcome> {
        let event = match self.map_record(&record) {
            Mapping::Event(event) => Arc::new(event),
            Mapping::Ignored => {
                debug!(
                    key = %record.key,
                    discriminator = record.discriminator().unwrap_or("-"),
                    "Ignoring change for unregistered entity"
                );
                return Ok(RecordOutcome::Ignored);
            }
            Mapping::Undecodable(error) => {
                warn!(key = %record.key, error = %error, "Change image does not decode");
                let dead_letter = DeadLetter::undecodable(record, &error, COMPONENT);
                return self.dead_letter(dead_letter).await;
            }
        };

        let attempts = AtomicU32::new(0);
        let counter = &attempts;
        let bus = &self.bus;
        let published = (|| {
            let event = Arc::clone(&event);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                bus.publish(event).await
            }
        })
        .retry(publish_backoff(&self.config))
        .notify(|err: &BusError, dur: Duration| {
            warn!(event_type = %event.event_type, error = %err, delay = ?dur, "Publish failed, retrying");
        })
        .await;

        match published {
            Ok(()) => {
                debug!(key = %record.key, event = %event, "Published change event");
                Ok(RecordOutcome::Published)
            }
            Err(e) => {
                let attempts = attempts.load(Ordering::SeqCst);
                let dead_letter = DeadLetter::publish_exhausted(
                    record,
                    &event.event_type,
                    &e.to_string(),
                    attempts,
                    COMPONENT,
                );
                self.dead_letter(dead_letter).await
            }
        }
    }

    async fn dead_letter(&self, dead_letter: DeadLetter) -> Result<RecordOutcome> {
        let event_id = dead_letter.payload.id();
        self.dlq
            .publish(dead_letter)
            .await
            .map_err(|source| TriggerError::DeadLetter { event_id, source })?;
        Ok(RecordOutcome::DeadLettered)
    }

    /// Handle a batch, preserving feed order per key.
    pub async fn handle_batch(&self, records: Vec<ChangeRecord>) -> Result<BatchReport> {
        let count = records.len();
        let groups = group_by_key(records);

        let results = join_all(groups.into_iter().map(|group| async move {
            let mut report = BatchReport::default();
            for record in group {
                report.record(self.handle_record(record).await?);
            }
            Ok::<_, TriggerError>(report)
        }))
        .await;

        let mut report = BatchReport::default();
        for result in results {
            report.merge(result?);
        }

        info!(
            records = count,
            published = report.published,
            ignored = report.ignored,
            dead_lettered = report.dead_lettered,
            "Handled change batch"
        );
        Ok(report)
    }

    /// Handle a change-stream batch in its JSON wire form.
    pub async fn handle_stream_json(&self, json: &str) -> Result<BatchReport> {
        let records = parse_stream_batch(json)?;
        self.handle_batch(records).await
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn registered(&self, kind: EntityKind) -> bool {
        self.registry.get(kind.as_str()).is_some()
    }
}

/// Split records into per-key groups, keeping feed order inside each group
/// and first-seen order across groups.
fn group_by_key(records: Vec<ChangeRecord>) -> Vec<Vec<ChangeRecord>> {
    let mut index: HashMap<TableKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<ChangeRecord>> = Vec::new();
    for record in records {
        match index.get(&record.key) {
            Some(&i) => groups[i].push(record),
            None => {
                index.insert(record.key.clone(), groups.len());
                groups.push(vec![record]);
            }
        }
    }
    groups
}
