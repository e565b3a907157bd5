//! Entity key scheme.
//!
//! Every entity lives in the one shared table, addressed by a `(PK, SK)` pair
//! computed from its natural identifiers. Hierarchy is encoded as key
//! prefixes so that "all children of X" is a single partition range scan:
//!
//! ```text
//! AGENCY                 AGENCY#{agencyId}
//! AGENCY#{agencyId}      PROPERTY#{propertyId}
//! AGENCY#{agencyId}      PROPERTY#{propertyId}#INSPECTION#{inspectionId}
//! AGENCY#{agencyId}      MODEL#{modelId}
//! PROPERTY#{propertyId}  ROOM#{roomId}
//! PROPERTY#{propertyId}  ROOM#{roomId}#ELEMENT#{elementId}
//! ```
//!
//! A partition may hold several entity kinds, so typed listings also filter
//! on the `_et` discriminator.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

mod agency;
mod codec;
mod inspection;
mod model;
mod property;
mod room;
mod room_element;

pub use agency::{Agency, AgencyId};
pub use codec::{decode, discriminator_of, encode, strip_table_attributes, CodecError};
pub use inspection::{Inspection, InspectionId, InspectionStatus};
pub use model::{Model, ModelId};
pub use property::{Address, Owner, Property, PropertyId, RoomElementTemplate, RoomTemplate};
pub use room::{Room, RoomId};
pub use room_element::{ElementType, RoomElement, RoomElementId};

/// Partition key attribute name.
pub const PK_ATTR: &str = "PK";
/// Range key attribute name.
pub const SK_ATTR: &str = "SK";
/// Entity discriminator attribute name.
pub const ENTITY_ATTR: &str = "_et";
/// Logical clock attribute name.
pub const OPLOCK_ATTR: &str = "oplock";
/// Externally-authoritative marker attribute name.
pub const LATCHED_ATTR: &str = "latched";
/// Soft-deletion marker attribute name.
pub const DELETED_ATTR: &str = "deleted";
/// Expiry (Unix seconds) attribute name.
pub const TTL_ATTR: &str = "ttl";

/// Separator between key segments.
pub const KEY_SEPARATOR: char = '#';

/// Errors raised while computing keys from identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Identifier '{field}' is empty")]
    Empty { field: &'static str },

    #[error("Identifier '{field}' contains the key separator: {value}")]
    Separator { field: &'static str, value: String },
}

/// Composite table key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableKey {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
}

impl TableKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.pk, self.sk)
    }
}

/// Range query over one partition, optionally narrowed to a range-key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyQuery {
    pub partition: String,
    pub prefix: Option<String>,
}

impl KeyQuery {
    pub fn partition(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Whether a range key falls inside this query.
    pub fn matches_sk(&self, sk: &str) -> bool {
        match &self.prefix {
            Some(prefix) => sk.starts_with(prefix.as_str()),
            None => true,
        }
    }
}

/// Entity discriminator stored in `_et`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Agency,
    Property,
    Room,
    RoomElement,
    Inspection,
    Model,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Agency,
        EntityKind::Property,
        EntityKind::Room,
        EntityKind::RoomElement,
        EntityKind::Inspection,
        EntityKind::Model,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Agency => "Agency",
            EntityKind::Property => "Property",
            EntityKind::Room => "Room",
            EntityKind::RoomElement => "RoomElement",
            EntityKind::Inspection => "Inspection",
            EntityKind::Model => "Model",
        }
    }

    /// Parse a stored discriminator. Unknown tags yield `None`.
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record metadata shared by every entity.
///
/// Flattened into the entity body, so the persisted item carries `oplock`,
/// `latched`, `deleted` and `ttl` as top-level attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Unix seconds of the last accepted write. `None` means never stamped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oplock: Option<i64>,
    /// Set when the record was written from an external event source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latched: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
    /// Expiry in Unix seconds; the store removes the item after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
}

impl RecordMeta {
    pub fn stamped(oplock: i64) -> Self {
        Self {
            oplock: Some(oplock),
            ..Self::default()
        }
    }
}

/// Natural identifier of an entity, mapped to its table key.
pub trait EntityId: fmt::Debug + Send + Sync {
    fn key(&self) -> Result<TableKey, KeyError>;
}

/// A record type stored in the shared table.
///
/// This is the single descriptor through which the write guard, repository,
/// change-feed mapper and inbound listener reach an entity type.
pub trait Entity: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;

    type Id: EntityId;

    fn id(&self) -> Self::Id;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn key(&self) -> Result<TableKey, KeyError> {
        self.id().key()
    }

    fn oplock(&self) -> Option<i64> {
        self.meta().oplock
    }
}

/// Validate one identifier segment.
pub(crate) fn segment<'a>(field: &'static str, value: &'a str) -> Result<&'a str, KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty { field });
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(KeyError::Separator {
            field,
            value: value.to_string(),
        });
    }
    Ok(value)
}

// ============================================================================
// Parent/child queries
// ============================================================================

/// All agencies.
pub fn agencies() -> KeyQuery {
    KeyQuery::partition("AGENCY").with_prefix("AGENCY#")
}

/// Properties of an agency.
pub fn properties_of(agency_id: &str) -> Result<KeyQuery, KeyError> {
    Ok(agency_partition(agency_id)?.with_prefix("PROPERTY#"))
}

/// Inspections of an agency, optionally narrowed to one property.
pub fn inspections_of(agency_id: &str, property_id: Option<&str>) -> Result<KeyQuery, KeyError> {
    let query = agency_partition(agency_id)?;
    Ok(match property_id {
        Some(property_id) => query.with_prefix(format!(
            "PROPERTY#{}#INSPECTION#",
            segment("propertyId", property_id)?
        )),
        None => query.with_prefix("PROPERTY#"),
    })
}

/// Model templates of an agency.
pub fn models_of(agency_id: &str) -> Result<KeyQuery, KeyError> {
    Ok(agency_partition(agency_id)?.with_prefix("MODEL#"))
}

/// Rooms of a property.
pub fn rooms_of(property_id: &str) -> Result<KeyQuery, KeyError> {
    Ok(property_partition(property_id)?.with_prefix("ROOM#"))
}

/// Room elements of a property, optionally narrowed to one room.
pub fn elements_of(property_id: &str, room_id: Option<&str>) -> Result<KeyQuery, KeyError> {
    let query = property_partition(property_id)?;
    Ok(match room_id {
        Some(room_id) => {
            query.with_prefix(format!("ROOM#{}#ELEMENT#", segment("roomId", room_id)?))
        }
        None => query.with_prefix("ROOM#"),
    })
}

pub(crate) fn agency_partition(agency_id: &str) -> Result<KeyQuery, KeyError> {
    Ok(KeyQuery::partition(format!(
        "AGENCY#{}",
        segment("agencyId", agency_id)?
    )))
}

pub(crate) fn property_partition(property_id: &str) -> Result<KeyQuery, KeyError> {
    Ok(KeyQuery::partition(format!(
        "PROPERTY#{}",
        segment("propertyId", property_id)?
    )))
}

#[cfg(test)]
mod tests;
