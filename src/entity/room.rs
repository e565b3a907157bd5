//! Room of a property.

use serde::{Deserialize, Serialize};

use super::{segment, Entity, EntityId, EntityKind, KeyError, RecordMeta, TableKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub agency_id: String,
    pub property_id: String,
    pub room_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomId {
    pub property_id: String,
    pub room_id: String,
}

impl RoomId {
    pub fn new(property_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            room_id: room_id.into(),
        }
    }
}

impl EntityId for RoomId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            format!("PROPERTY#{}", segment("propertyId", &self.property_id)?),
            format!("ROOM#{}", segment("roomId", &self.room_id)?),
        ))
    }
}

impl Entity for Room {
    const KIND: EntityKind = EntityKind::Room;

    type Id = RoomId;

    fn id(&self) -> RoomId {
        RoomId::new(&self.property_id, &self.room_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
