//! Change records: one per committed mutation on the shared table.
//!
//! Records come either from the in-memory table's broadcast feed or from a
//! managed change-stream batch, delivered as JSON:
//!
//! ```text
//! {"Records": [{"eventID": "...", "eventName": "INSERT|MODIFY|REMOVE",
//!               "dynamodb": {"Keys": {...}, "NewImage": {...}, "OldImage": {...},
//!                            "SequenceNumber": "...", "ApproximateCreationDateTime": 1.7e9}}]}
//! ```

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::attribute_value::{unmarshal_item, AttributeValueError};
use super::Item;
use crate::entity::{discriminator_of, TableKey, PK_ATTR, SK_ATTR};

/// Kind of committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Modify => "MODIFY",
            ChangeKind::Remove => "REMOVE",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "INSERT" => Some(ChangeKind::Insert),
            "MODIFY" => Some(ChangeKind::Modify),
            "REMOVE" => Some(ChangeKind::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors decoding change-stream input.
#[derive(Debug, thiserror::Error)]
pub enum ChangeFeedError {
    #[error("Invalid change batch JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid attribute value: {0}")]
    AttributeValue(#[from] AttributeValueError),

    #[error("Unknown event name: {0}")]
    UnknownEventName(String),

    #[error("Change record is missing key attribute '{0}'")]
    MissingKey(&'static str),
}

/// A committed mutation on one table key.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Unique id of this change; stable across redelivery.
    pub event_id: String,
    pub kind: ChangeKind,
    pub key: TableKey,
    pub new_image: Option<Item>,
    pub old_image: Option<Item>,
    /// Position in the per-key feed.
    pub sequence_number: String,
    /// Commit time in Unix seconds.
    pub approximate_creation: i64,
}

impl ChangeRecord {
    /// The image an event is built from.
    ///
    /// Removals use the pre-image, falling back to the post-image; inserts and
    /// modifications use the post-image, falling back to the pre-image.
    pub fn image(&self) -> Option<&Item> {
        match self.kind {
            ChangeKind::Remove => self.old_image.as_ref().or(self.new_image.as_ref()),
            ChangeKind::Insert | ChangeKind::Modify => {
                self.new_image.as_ref().or(self.old_image.as_ref())
            }
        }
    }

    /// The `_et` discriminator of the relevant image.
    pub fn discriminator(&self) -> Option<&str> {
        self.image().and_then(discriminator_of)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StreamBatch {
    #[serde(default)]
    records: Vec<StreamRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamRecord {
    #[serde(rename = "eventID")]
    event_id: String,
    event_name: String,
    dynamodb: StreamPayload,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StreamPayload {
    #[serde(default)]
    keys: Map<String, Value>,
    new_image: Option<Map<String, Value>>,
    old_image: Option<Map<String, Value>>,
    #[serde(default)]
    sequence_number: String,
    approximate_creation_date_time: Option<f64>,
}

impl TryFrom<StreamRecord> for ChangeRecord {
    type Error = ChangeFeedError;

    fn try_from(record: StreamRecord) -> Result<Self, Self::Error> {
        let kind = ChangeKind::parse(&record.event_name)
            .ok_or_else(|| ChangeFeedError::UnknownEventName(record.event_name.clone()))?;
        let keys = unmarshal_item(&record.dynamodb.keys)?;
        let key_attr = |name: &'static str| {
            keys.get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or(ChangeFeedError::MissingKey(name))
        };
        let key = TableKey::new(key_attr(PK_ATTR)?, key_attr(SK_ATTR)?);

        Ok(ChangeRecord {
            event_id: record.event_id,
            kind,
            key,
            new_image: record
                .dynamodb
                .new_image
                .as_ref()
                .map(unmarshal_item)
                .transpose()?,
            old_image: record
                .dynamodb
                .old_image
                .as_ref()
                .map(unmarshal_item)
                .transpose()?,
            sequence_number: record.dynamodb.sequence_number,
            approximate_creation: record
                .dynamodb
                .approximate_creation_date_time
                .map(|t| t as i64)
                .unwrap_or_default(),
        })
    }
}

/// Parse a change-stream batch into change records, preserving order.
pub fn parse_stream_batch(json: &str) -> Result<Vec<ChangeRecord>, ChangeFeedError> {
    let batch: StreamBatch = serde_json::from_str(json)?;
    batch
        .records
        .into_iter()
        .map(ChangeRecord::try_from)
        .collect()
}
