use serde_json::json;

use super::*;

fn address() -> Address {
    Address {
        number: "12".to_string(),
        street: "Rue de la Paix".to_string(),
        city: "Paris".to_string(),
        zip_code: "75002".to_string(),
        country: "FR".to_string(),
    }
}

fn property(agency: &str, property: &str) -> Property {
    Property {
        property_id: property.to_string(),
        agency_id: agency.to_string(),
        address: address(),
        owner: None,
        rooms: vec![RoomTemplate {
            name: "Kitchen".to_string(),
            area: Some(12.5),
            description: None,
            elements: vec![RoomElementTemplate {
                name: "Sink".to_string(),
                description: None,
                images: None,
                element_type: ElementType::Plumbing,
            }],
        }],
        meta: RecordMeta::stamped(100),
    }
}

#[test]
fn test_keys_are_deterministic() {
    assert_eq!(
        AgencyId::new("a1").key().unwrap(),
        TableKey::new("AGENCY", "AGENCY#a1")
    );
    assert_eq!(
        PropertyId::new("a1", "p1").key().unwrap(),
        TableKey::new("AGENCY#a1", "PROPERTY#p1")
    );
    assert_eq!(
        InspectionId::new("a1", "p1", "i1").key().unwrap(),
        TableKey::new("AGENCY#a1", "PROPERTY#p1#INSPECTION#i1")
    );
    assert_eq!(
        ModelId::new("a1", "m1").key().unwrap(),
        TableKey::new("AGENCY#a1", "MODEL#m1")
    );
    assert_eq!(
        RoomId::new("p1", "r1").key().unwrap(),
        TableKey::new("PROPERTY#p1", "ROOM#r1")
    );
    assert_eq!(
        RoomElementId::new("p1", "r1", "e1").key().unwrap(),
        TableKey::new("PROPERTY#p1", "ROOM#r1#ELEMENT#e1")
    );
}

#[test]
fn test_key_rejects_empty_and_separator() {
    assert_eq!(
        AgencyId::new("").key(),
        Err(KeyError::Empty { field: "agencyId" })
    );
    assert!(matches!(
        PropertyId::new("a1", "p#1").key(),
        Err(KeyError::Separator {
            field: "propertyId",
            ..
        })
    ));
    assert!(properties_of("").is_err());
}

#[test]
fn test_child_keys_fall_under_parent_queries() {
    let inspection = InspectionId::new("a1", "p1", "i1").key().unwrap();
    let query = inspections_of("a1", Some("p1")).unwrap();
    assert_eq!(query.partition, inspection.pk);
    assert!(query.matches_sk(&inspection.sk));

    let element = RoomElementId::new("p1", "r1", "e1").key().unwrap();
    let query = elements_of("p1", Some("r1")).unwrap();
    assert_eq!(query.partition, element.pk);
    assert!(query.matches_sk(&element.sk));

    let property = PropertyId::new("a1", "p1").key().unwrap();
    let query = properties_of("a1").unwrap();
    assert!(query.matches_sk(&property.sk));
    assert!(!models_of("a1").unwrap().matches_sk(&property.sk));
}

#[test]
fn test_room_prefix_does_not_match_longer_room_id() {
    let query = elements_of("p1", Some("r1")).unwrap();
    let other = RoomElementId::new("p1", "r10", "e1").key().unwrap();
    assert!(!query.matches_sk(&other.sk));
}

#[test]
fn test_entity_kind_parse() {
    for kind in EntityKind::ALL {
        assert_eq!(EntityKind::parse(kind.as_str()), Some(kind));
    }
    assert_eq!(EntityKind::parse("Invoice"), None);
}

#[test]
fn test_encode_adds_table_attributes() {
    let (key, item) = encode(&property("a1", "p1")).unwrap();
    assert_eq!(key, TableKey::new("AGENCY#a1", "PROPERTY#p1"));
    assert_eq!(item[PK_ATTR], json!("AGENCY#a1"));
    assert_eq!(item[SK_ATTR], json!("PROPERTY#p1"));
    assert_eq!(item[ENTITY_ATTR], json!("Property"));
    assert_eq!(item[OPLOCK_ATTR], json!(100));
    assert_eq!(item["propertyId"], json!("p1"));
    assert_eq!(item["rooms"][0]["elements"][0]["type"], json!("PLUMBING"));
    assert!(!item.contains_key(LATCHED_ATTR));
}

#[test]
fn test_decode_round_trips_and_checks_kind() {
    let original = property("a1", "p1");
    let (_, item) = encode(&original).unwrap();

    let decoded: Property = decode(&item).unwrap();
    assert_eq!(decoded, original);

    let err = decode::<Agency>(&item).unwrap_err();
    assert!(matches!(err, CodecError::WrongKind { found, .. } if found == "Property"));
}

#[test]
fn test_decode_reads_metadata_flags() {
    let item = json!({
        "agencyId": "a1",
        "name": "Agence",
        "contactMail": "contact@agence.fr",
        "address": {
            "number": "1", "street": "Main", "city": "Lyon",
            "zipCode": "69001", "country": "FR"
        },
        "oplock": 42,
        "latched": true
    });
    let item = item.as_object().unwrap().clone();

    let agency: Agency = decode(&item).unwrap();
    assert_eq!(agency.meta.oplock, Some(42));
    assert_eq!(agency.meta.latched, Some(true));
    assert_eq!(agency.contact_phone, None);
}

#[test]
fn test_strip_table_attributes() {
    let (_, item) = encode(&property("a1", "p1")).unwrap();
    let body = strip_table_attributes(item);
    assert!(!body.contains_key(PK_ATTR));
    assert!(!body.contains_key(SK_ATTR));
    assert!(!body.contains_key(ENTITY_ATTR));
    assert!(body.contains_key("propertyId"));
}
