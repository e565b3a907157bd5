use serde_json::json;

use super::*;
use crate::storage::list_children;

fn attrs(value: Value) -> Item {
    value.as_object().cloned().unwrap()
}

fn always() -> Condition {
    Condition::AttributeNotExists("never-set".to_string())
}

#[tokio::test]
async fn test_update_inserts_and_emits_insert() {
    let table = MemoryTable::new();
    let mut feed = table.subscribe_changes();
    let key = TableKey::new("AGENCY", "AGENCY#a1");

    let outcome = table
        .update_if(&key, attrs(json!({"name": "A", "oplock": 1})), &always())
        .await
        .unwrap();
    assert_eq!(outcome, ConditionalOutcome::Applied);

    let stored = table.get(&key).await.unwrap().unwrap();
    assert_eq!(stored["PK"], json!("AGENCY"));
    assert_eq!(stored["SK"], json!("AGENCY#a1"));
    assert_eq!(stored["name"], json!("A"));

    let record = feed.try_recv().unwrap();
    assert_eq!(record.kind, ChangeKind::Insert);
    assert_eq!(record.key, key);
    assert!(record.old_image.is_none());
    assert_eq!(record.new_image.unwrap()["oplock"], json!(1));
}

#[tokio::test]
async fn test_update_merges_attributes_and_emits_modify() {
    let table = MemoryTable::new();
    let key = TableKey::new("AGENCY", "AGENCY#a1");
    table
        .update_if(&key, attrs(json!({"name": "A", "contactMail": "a@a"})), &always())
        .await
        .unwrap();

    let mut feed = table.subscribe_changes();
    table
        .update_if(&key, attrs(json!({"name": "B"})), &always())
        .await
        .unwrap();

    let stored = table.get(&key).await.unwrap().unwrap();
    assert_eq!(stored["name"], json!("B"));
    assert_eq!(stored["contactMail"], json!("a@a"));

    let record = feed.try_recv().unwrap();
    assert_eq!(record.kind, ChangeKind::Modify);
    assert_eq!(record.old_image.unwrap()["name"], json!("A"));
    assert_eq!(record.new_image.unwrap()["name"], json!("B"));
}

#[tokio::test]
async fn test_unchanged_write_emits_nothing() {
    let table = MemoryTable::new();
    let key = TableKey::new("AGENCY", "AGENCY#a1");
    table
        .update_if(&key, attrs(json!({"name": "A"})), &always())
        .await
        .unwrap();

    let mut feed = table.subscribe_changes();
    let outcome = table
        .update_if(&key, attrs(json!({"name": "A"})), &always())
        .await
        .unwrap();

    assert_eq!(outcome, ConditionalOutcome::Applied);
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_failed_condition_writes_nothing() {
    let table = MemoryTable::new();
    let mut feed = table.subscribe_changes();
    let key = TableKey::new("AGENCY", "AGENCY#a1");

    let outcome = table
        .update_if(
            &key,
            attrs(json!({"name": "A"})),
            &Condition::AttributeAtMost("oplock".to_string(), 5),
        )
        .await
        .unwrap();

    assert_eq!(outcome, ConditionalOutcome::ConditionFailed);
    assert!(table.get(&key).await.unwrap().is_none());
    assert!(table.is_empty().await);
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_delete_returns_old_image_and_emits_remove() {
    let table = MemoryTable::new();
    let key = TableKey::new("AGENCY", "AGENCY#a1");
    table
        .update_if(&key, attrs(json!({"name": "A"})), &always())
        .await
        .unwrap();

    let mut feed = table.subscribe_changes();
    let removed = table.delete(&key).await.unwrap().unwrap();
    assert_eq!(removed["name"], json!("A"));
    assert!(table.get(&key).await.unwrap().is_none());

    let record = feed.try_recv().unwrap();
    assert_eq!(record.kind, ChangeKind::Remove);
    assert!(record.new_image.is_none());
    assert_eq!(record.old_image.unwrap()["name"], json!("A"));

    assert!(table.delete(&key).await.unwrap().is_none());
    assert!(feed.try_recv().is_err());
}

#[tokio::test]
async fn test_query_pages_in_range_key_order() {
    let table = MemoryTable::new();
    for sk in ["ROOM#b", "ROOM#a", "ROOM#c", "OTHER#x"] {
        table
            .update_if(&TableKey::new("PROPERTY#p1", sk), Item::new(), &always())
            .await
            .unwrap();
    }
    let query = KeyQuery::partition("PROPERTY#p1").with_prefix("ROOM#");

    let first = table.query(&query, None, 2).await.unwrap();
    let sks: Vec<_> = first.items.iter().map(|i| i["SK"].clone()).collect();
    assert_eq!(sks, vec![json!("ROOM#a"), json!("ROOM#b")]);
    let cursor = first.last_evaluated.unwrap();
    assert_eq!(cursor, TableKey::new("PROPERTY#p1", "ROOM#b"));

    let second = table.query(&query, Some(&cursor), 2).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0]["SK"], json!("ROOM#c"));
    assert!(second.last_evaluated.is_none());
}

#[tokio::test]
async fn test_query_unknown_partition_is_empty() {
    let table = MemoryTable::new();
    let page = table
        .query(&KeyQuery::partition("AGENCY#none"), None, 10)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(page.last_evaluated.is_none());
}

#[tokio::test]
async fn test_list_children_is_complete_for_every_page_size() {
    let table = MemoryTable::new();
    for i in 0..7 {
        table
            .update_if(
                &TableKey::new("AGENCY#a1", format!("PROPERTY#p{}", i)),
                Item::new(),
                &always(),
            )
            .await
            .unwrap();
    }
    table
        .update_if(&TableKey::new("AGENCY#a1", "MODEL#m1"), Item::new(), &always())
        .await
        .unwrap();

    let query = KeyQuery::partition("AGENCY#a1").with_prefix("PROPERTY#");
    for page_size in 1..=9 {
        let items = list_children(&table, &query, page_size).await.unwrap();
        assert_eq!(items.len(), 7, "page size {}", page_size);
    }
}

#[tokio::test]
async fn test_expire_removes_due_items() {
    let table = MemoryTable::new();
    let due = TableKey::new("AGENCY#a1", "PROPERTY#p1#INSPECTION#i1");
    let live = TableKey::new("AGENCY#a1", "PROPERTY#p1#INSPECTION#i2");
    table
        .update_if(&due, attrs(json!({"ttl": 100})), &always())
        .await
        .unwrap();
    table
        .update_if(&live, attrs(json!({"ttl": 300})), &always())
        .await
        .unwrap();

    let mut feed = table.subscribe_changes();
    assert_eq!(table.expire(200).await, 1);
    assert!(table.get(&due).await.unwrap().is_none());
    assert!(table.get(&live).await.unwrap().is_some());

    let record = feed.try_recv().unwrap();
    assert_eq!(record.kind, ChangeKind::Remove);
    assert_eq!(record.key, due);
}

#[tokio::test]
async fn test_failure_injection() {
    let table = MemoryTable::new();
    let key = TableKey::new("AGENCY", "AGENCY#a1");

    table.set_fail_on_write(true).await;
    assert!(matches!(
        table.update_if(&key, Item::new(), &always()).await,
        Err(StorageError::Unavailable(_))
    ));

    table.set_fail_on_read(true).await;
    assert!(table.get(&key).await.is_err());
}

#[tokio::test]
async fn test_sequence_numbers_increase() {
    let table = MemoryTable::new();
    let mut feed = table.subscribe_changes();
    let key = TableKey::new("AGENCY", "AGENCY#a1");
    table
        .update_if(&key, attrs(json!({"n": 1})), &always())
        .await
        .unwrap();
    table
        .update_if(&key, attrs(json!({"n": 2})), &always())
        .await
        .unwrap();

    let first = feed.try_recv().unwrap();
    let second = feed.try_recv().unwrap();
    assert!(first.sequence_number < second.sequence_number);
    assert_ne!(first.event_id, second.event_id);
}
