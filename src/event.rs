//! Domain events.
//!
//! One event per committed change, typed `<Entity><Created|Updated|Deleted>`,
//! serialized as:
//!
//! ```text
//! {"id": "<uuid>", "type": "AgencyCreated", "source": "dashboard-mgt",
//!  "timestamp": 1700000000, "data": {...entity attributes...}}
//! ```
//!
//! Delivery is at-least-once; consumers dedupe on `id` + `timestamp`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::entity::EntityKind;
use crate::storage::{ChangeKind, Item};
use crate::utils::clock::unix_now;

/// Mutation an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::Created => "Created",
            EventAction::Updated => "Updated",
            EventAction::Deleted => "Deleted",
        }
    }

    pub fn from_change(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Insert => EventAction::Created,
            ChangeKind::Modify => EventAction::Updated,
            ChangeKind::Remove => EventAction::Deleted,
        }
    }
}

/// Event type tag for an entity mutation, e.g. `RoomElementUpdated`.
pub fn event_type(kind: EntityKind, action: EventAction) -> String {
    format!("{}{}", kind.as_str(), action.as_str())
}

/// Split an event type tag into entity and action. Unknown tags yield `None`.
pub fn parse_event_type(tag: &str) -> Option<(EntityKind, EventAction)> {
    [EventAction::Created, EventAction::Updated, EventAction::Deleted]
        .into_iter()
        .find_map(|action| {
            let entity = tag.strip_suffix(action.as_str())?;
            Some((EntityKind::parse(entity)?, action))
        })
}

/// An outward-facing domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub source: String,
    /// Emission time in Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub data: Value,
}

impl DomainEvent {
    /// New event with a random id, stamped now.
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.into(),
            source: source.into(),
            timestamp: unix_now(),
            data,
        }
    }

    /// Event for one change record.
    ///
    /// The id is derived from the change's own id and the timestamp is the
    /// change's commit time, so redelivered changes yield identical events.
    pub fn for_change(
        change_id: &str,
        event_type: String,
        source: &str,
        timestamp: i64,
        data: Item,
    ) -> Self {
        let name = format!("{}/{}", change_id, event_type);
        let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes());
        Self {
            id,
            event_type,
            source: source.to_string(),
            timestamp,
            data: Value::Object(data),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl fmt::Display for DomainEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}@{})", self.event_type, self.id, self.timestamp)
    }
}
