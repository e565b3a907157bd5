//! Element (furniture, fixture, surface...) inside a room.

use serde::{Deserialize, Serialize};

use super::{segment, Entity, EntityId, EntityKind, KeyError, RecordMeta, TableKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Furniture,
    Structural,
    Electrical,
    Plumbing,
    Ventilation,
    Surface,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomElement {
    pub agency_id: String,
    pub property_id: String,
    pub room_id: String,
    pub element_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomElementId {
    pub property_id: String,
    pub room_id: String,
    pub element_id: String,
}

impl RoomElementId {
    pub fn new(
        property_id: impl Into<String>,
        room_id: impl Into<String>,
        element_id: impl Into<String>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            room_id: room_id.into(),
            element_id: element_id.into(),
        }
    }
}

impl EntityId for RoomElementId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            format!("PROPERTY#{}", segment("propertyId", &self.property_id)?),
            format!(
                "ROOM#{}#ELEMENT#{}",
                segment("roomId", &self.room_id)?,
                segment("elementId", &self.element_id)?
            ),
        ))
    }
}

impl Entity for RoomElement {
    const KIND: EntityKind = EntityKind::RoomElement;

    type Id = RoomElementId;

    fn id(&self) -> RoomElementId {
        RoomElementId::new(&self.property_id, &self.room_id, &self.element_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
