//! Agency: the top-level owner of every other entity family.

use serde::{Deserialize, Serialize};

use super::{segment, Address, Entity, EntityId, EntityKind, KeyError, RecordMeta, TableKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agency {
    pub agency_id: String,
    pub name: String,
    pub contact_mail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    pub address: Address,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgencyId {
    pub agency_id: String,
}

impl AgencyId {
    pub fn new(agency_id: impl Into<String>) -> Self {
        Self {
            agency_id: agency_id.into(),
        }
    }
}

impl EntityId for AgencyId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            "AGENCY",
            format!("AGENCY#{}", segment("agencyId", &self.agency_id)?),
        ))
    }
}

impl Entity for Agency {
    const KIND: EntityKind = EntityKind::Agency;

    type Id = AgencyId;

    fn id(&self) -> AgencyId {
        AgencyId::new(&self.agency_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
