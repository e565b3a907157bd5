//! Committed writes flowing out of the change feed as domain events.
//!
//! Run with: cargo test --test change_feed

mod common;

use std::collections::HashSet;
use std::time::Duration;

use serde_json::json;

use dashboard_mgt::entity::{Agency, AgencyId, Property, PropertyId};
use dashboard_mgt::event::DomainEvent;

use common::{agency, element, inspection, model, property, room, Pipeline, SOURCE};

fn types(events: &[DomainEvent]) -> Vec<&str> {
    events.iter().map(|e| e.event_type.as_str()).collect()
}

#[tokio::test]
async fn test_new_entity_emits_one_created_event() {
    let pipeline = Pipeline::start();

    pipeline
        .repository
        .write(&agency("a1", Some(1)))
        .await
        .unwrap();

    let (report, bus) = pipeline.finish().await;
    let events = bus.published().await;
    assert_eq!(report.published, 1);
    assert_eq!(types(&events), vec!["AgencyCreated"]);
    assert_eq!(events[0].source, SOURCE);
    assert_eq!(events[0].data["agencyId"], json!("a1"));
    assert_eq!(events[0].data["oplock"], json!(1));
}

#[tokio::test]
async fn test_delete_emits_deleted_event_and_record_is_gone() {
    let pipeline = Pipeline::start();
    let repo = pipeline.repository.clone();
    let id = PropertyId::new("a1", "p1");

    repo.write(&property("a1", "p1")).await.unwrap();
    let removed = repo.delete::<Property>(&id).await.unwrap();

    assert!(removed.is_some());
    assert!(repo.get::<Property>(&id).await.unwrap().is_none());
    drop(repo);

    let (_, bus) = pipeline.finish().await;
    let events = bus.published().await;
    assert_eq!(types(&events), vec!["PropertyCreated", "PropertyDeleted"]);
    let deleted = &events[1];
    assert_eq!(deleted.data["agencyId"], json!("a1"));
    assert_eq!(deleted.data["propertyId"], json!("p1"));
}

#[tokio::test]
async fn test_every_entity_type_maps_to_typed_events() {
    let pipeline = Pipeline::start();
    let repo = pipeline.repository.clone();

    repo.write(&agency("a1", Some(1))).await.unwrap();
    repo.write(&property("a1", "p1")).await.unwrap();
    repo.write(&room("p1", "r1")).await.unwrap();
    repo.write(&element("p1", "r1", "e1")).await.unwrap();
    repo.write(&inspection("a1", "p1", "i1")).await.unwrap();
    repo.write(&model("a1", "m1")).await.unwrap();

    let mut renamed = room("p1", "r1");
    renamed.name = "Office".to_string();
    renamed.meta.oplock = Some(2);
    repo.write(&renamed).await.unwrap();
    drop(repo);

    let (report, bus) = pipeline.finish().await;
    let events = bus.published().await;
    let got: HashSet<&str> = types(&events).into_iter().collect();
    let expected: HashSet<&str> = [
        "AgencyCreated",
        "PropertyCreated",
        "RoomCreated",
        "RoomElementCreated",
        "InspectionCreated",
        "ModelCreated",
        "RoomUpdated",
    ]
    .into_iter()
    .collect();

    assert_eq!(report.published, 7);
    assert_eq!(got, expected);
    let updated = events
        .iter()
        .find(|e| e.event_type == "RoomUpdated")
        .unwrap();
    assert_eq!(updated.data["name"], json!("Office"));
}

#[tokio::test]
async fn test_rejected_and_unchanged_writes_emit_nothing() {
    let pipeline = Pipeline::start();
    let repo = pipeline.repository.clone();

    repo.write(&agency("a1", Some(100))).await.unwrap();
    repo.update(&agency("a1", Some(50))).await.unwrap();
    repo.update(&agency("a1", Some(100))).await.unwrap();
    drop(repo);

    let (report, bus) = pipeline.finish().await;
    assert_eq!(report.published, 1);
    assert_eq!(types(&bus.published().await), vec!["AgencyCreated"]);
}

#[tokio::test]
async fn test_per_key_events_follow_commit_order() {
    let pipeline = Pipeline::start();
    let repo = pipeline.repository.clone();

    for oplock in 1..=5 {
        repo.write(&agency("a1", Some(oplock))).await.unwrap();
        repo.write(&agency("a2", Some(oplock))).await.unwrap();
    }
    drop(repo);

    let (_, bus) = pipeline.finish().await;
    let events = bus.published().await;
    for agency_id in ["a1", "a2"] {
        let oplocks: Vec<i64> = events
            .iter()
            .filter(|e| e.data["agencyId"] == json!(agency_id))
            .filter_map(|e| e.data["oplock"].as_i64())
            .collect();
        assert_eq!(oplocks, vec![1, 2, 3, 4, 5], "agency {}", agency_id);
    }
}

#[tokio::test]
async fn test_publish_outage_dead_letters_instead_of_dropping() {
    let mut pipeline = Pipeline::start();
    pipeline.bus.set_fail_on_publish(true).await;

    pipeline
        .repository
        .write(&agency("a1", Some(1)))
        .await
        .unwrap();

    let dead_letter = tokio::time::timeout(Duration::from_secs(5), pipeline.dead_letters.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dead_letter.event_type.as_deref(), Some("AgencyCreated"));
    assert_eq!(dead_letter.attempts, 3);
    assert_eq!(pipeline.bus.published_count().await, 0);
}

#[tokio::test]
async fn test_soft_delete_then_expiry_emits_updated_then_deleted() {
    let pipeline = Pipeline::start();
    let repo = pipeline.repository.clone();
    let table = pipeline.table.clone();
    let id = AgencyId::new("a1");

    repo.write(&agency("a1", Some(1))).await.unwrap();
    repo.mark_deleted::<Agency>(&id, 2, Duration::from_secs(0))
        .await
        .unwrap();
    let stored = repo.get::<Agency>(&id).await.unwrap().unwrap();
    assert_eq!(stored.meta.deleted, Some(true));

    let ttl = stored.meta.ttl.unwrap();
    assert_eq!(table.expire(ttl).await, 1);
    drop(repo);
    drop(table);

    let (_, bus) = pipeline.finish().await;
    assert_eq!(
        types(&bus.published().await),
        vec!["AgencyCreated", "AgencyUpdated", "AgencyDeleted"]
    );
}

#[tokio::test]
async fn test_events_are_observable_while_running() {
    let pipeline = Pipeline::start();
    pipeline
        .repository
        .write(&property("a1", "p1"))
        .await
        .unwrap();

    let events = pipeline.published(1).await;
    assert_eq!(types(&events), vec!["PropertyCreated"]);
}
