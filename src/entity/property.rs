//! Property: a housing unit managed by an agency.

use serde::{Deserialize, Serialize};

use super::{segment, ElementType, Entity, EntityId, EntityKind, KeyError, RecordMeta, TableKey};

/// Postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub number: String,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

/// Room layout embedded in properties and model templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub elements: Vec<RoomElementTemplate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomElementTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(rename = "type")]
    pub element_type: ElementType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub property_id: String,
    pub agency_id: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default)]
    pub rooms: Vec<RoomTemplate>,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyId {
    pub agency_id: String,
    pub property_id: String,
}

impl PropertyId {
    pub fn new(agency_id: impl Into<String>, property_id: impl Into<String>) -> Self {
        Self {
            agency_id: agency_id.into(),
            property_id: property_id.into(),
        }
    }
}

impl EntityId for PropertyId {
    fn key(&self) -> Result<TableKey, KeyError> {
        Ok(TableKey::new(
            format!("AGENCY#{}", segment("agencyId", &self.agency_id)?),
            format!("PROPERTY#{}", segment("propertyId", &self.property_id)?),
        ))
    }
}

impl Entity for Property {
    const KIND: EntityKind = EntityKind::Property;

    type Id = PropertyId;

    fn id(&self) -> PropertyId {
        PropertyId::new(&self.agency_id, &self.property_id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}
