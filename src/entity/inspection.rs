//! Inspection of a property.

use serde::{Deserialize, Serialize};

use super::{segment, Entity, EntityId, EntityKind, KeyError, RecordMeta, TableKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionStatus {
    ToDo,
    InProgress,
    Done,
    Canceled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub inspection_id: String,
    pub property_id: String,
    pub agency_id: String,
    pub status: InspectionStatus,
    pub inspector_id: String,
    pub date: String,
    /// Inspection report per room; shape is owned by the inspection app.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms: Option<serde_json::Value>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionId {
    pub agency_id: String,
    pub property_id: String,
    pub inspection_id: String,
}

impl InspectionId {
    pub fn new(
        agency_id: impl Into<String>,
        property_id: impl Into<String>,
        inspection_id: impl Into<String>,
    ) -> Self {
        Self {
            agency_id: agency_id.into(),
            property_id: property_id.into(),
            inspection_id: inspection_id.into(),
        }
    }
}

impl EntityId for InspectionId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            format!("AGENCY#{}", segment("agencyId", &self.agency_id)?),
            format!(
                "PROPERTY#{}#INSPECTION#{}",
                segment("propertyId", &self.property_id)?,
                segment("inspectionId", &self.inspection_id)?
            ),
        ))
    }
}

impl Entity for Inspection {
    const KIND: EntityKind = EntityKind::Inspection;

    type Id = InspectionId;

    fn id(&self) -> InspectionId {
        InspectionId::new(&self.agency_id, &self.property_id, &self.inspection_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
