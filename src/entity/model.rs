//! Model: a reusable room layout template owned by an agency.

use serde::{Deserialize, Serialize};

use super::{segment, Entity, EntityId, EntityKind, KeyError, RecordMeta, RoomTemplate, TableKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub agency_id: String,
    pub model_id: String,
    pub name: String,
    #[serde(default)]
    pub rooms: Vec<RoomTemplate>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    pub agency_id: String,
    pub model_id: String,
}

impl ModelId {
    pub fn new(agency_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            agency_id: agency_id.into(),
            model_id: model_id.into(),
        }
    }
}

impl EntityId for ModelId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            format!("AGENCY#{}", segment("agencyId", &self.agency_id)?),
            format!("MODEL#{}", segment("modelId", &self.model_id)?),
        ))
    }
}

impl Entity for Model {
    const KIND: EntityKind = EntityKind::Model;

    type Id = ModelId;

    fn id(&self) -> ModelId {
        ModelId::new(&self.agency_id, &self.model_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
