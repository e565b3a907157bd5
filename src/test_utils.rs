//! Entity fixtures shared by unit tests.

use crate::entity::{
    Address, Agency, ElementType, Inspection, InspectionStatus, Model, Property, RecordMeta,
    Room, RoomElement, RoomElementTemplate, RoomTemplate,
};

pub fn address() -> Address {
    Address {
        number: "12".to_string(),
        street: "Rue des Lilas".to_string(),
        city: "Lyon".to_string(),
        zip_code: "69003".to_string(),
        country: "France".to_string(),
    }
}

pub fn agency(agency_id: &str, oplock: Option<i64>) -> Agency {
    Agency {
        agency_id: agency_id.to_string(),
        name: format!("Agency {}", agency_id),
        contact_mail: format!("{}@agency.test", agency_id),
        contact_phone: None,
        address: address(),
        meta: RecordMeta {
            oplock,
            ..RecordMeta::default()
        },
    }
}

pub fn room_templates() -> Vec<RoomTemplate> {
    vec![RoomTemplate {
        name: "Kitchen".to_string(),
        area: Some(12.5),
        description: None,
        elements: vec![RoomElementTemplate {
            name: "Sink".to_string(),
            description: None,
            images: None,
            element_type: ElementType::Plumbing,
        }],
    }]
}

pub fn property(agency_id: &str, property_id: &str, oplock: Option<i64>) -> Property {
    Property {
        property_id: property_id.to_string(),
        agency_id: agency_id.to_string(),
        address: address(),
        owner: None,
        rooms: room_templates(),
        meta: RecordMeta {
            oplock,
            ..RecordMeta::default()
        },
    }
}

pub fn inspection(agency_id: &str, property_id: &str, inspection_id: &str) -> Inspection {
    Inspection {
        inspection_id: inspection_id.to_string(),
        property_id: property_id.to_string(),
        agency_id: agency_id.to_string(),
        status: InspectionStatus::ToDo,
        inspector_id: "inspector-1".to_string(),
        date: "2024-03-01".to_string(),
        rooms: None,
        meta: RecordMeta::stamped(1),
    }
}

pub fn model(agency_id: &str, model_id: &str) -> Model {
    Model {
        agency_id: agency_id.to_string(),
        model_id: model_id.to_string(),
        name: "T2".to_string(),
        rooms: room_templates(),
        meta: RecordMeta::stamped(1),
    }
}

pub fn room(property_id: &str, room_id: &str) -> Room {
    Room {
        agency_id: "a1".to_string(),
        property_id: property_id.to_string(),
        room_id: room_id.to_string(),
        name: format!("Room {}", room_id),
        description: None,
        area: Some(9.0),
        meta: RecordMeta::stamped(1),
    }
}

pub fn element(property_id: &str, room_id: &str, element_id: &str) -> RoomElement {
    RoomElement {
        agency_id: "a1".to_string(),
        property_id: property_id.to_string(),
        room_id: room_id.to_string(),
        element_id: element_id.to_string(),
        name: "Radiator".to_string(),
        description: None,
        element_type: ElementType::Ventilation,
        meta: RecordMeta::stamped(1),
    }
}
