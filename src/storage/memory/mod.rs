//! In-memory table with a broadcast change feed.
//!
//! Stands in for the managed table in standalone mode and in tests. Every
//! committed mutation is published on a tokio broadcast channel in commit
//! order, mirroring a per-key ordered change stream:
//! - a write that leaves the stored image unchanged emits nothing
//! - TTL expiry (`expire`) removes items and emits REMOVE records

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    ChangeKind, ChangeRecord, Condition, ConditionalOutcome, Item, QueryPage, Result,
    StorageError, Table,
};
use crate::entity::{KeyQuery, TableKey, PK_ATTR, SK_ATTR, TTL_ATTR};
use crate::utils::clock::unix_now;

/// Change feed capacity.
const FEED_CAPACITY: usize = 4096;

type Partition = BTreeMap<String, Item>;

/// In-memory implementation of `Table`.
pub struct MemoryTable {
    partitions: RwLock<BTreeMap<String, Partition>>,
    feed: broadcast::Sender<ChangeRecord>,
    sequence: AtomicU64,
    fail_on_write: RwLock<bool>,
    fail_on_read: RwLock<bool>,
}

impl Default for MemoryTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTable {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        info!("In-memory table initialized");
        Self {
            partitions: RwLock::new(BTreeMap::new()),
            feed,
            sequence: AtomicU64::new(0),
            fail_on_write: RwLock::new(false),
            fail_on_read: RwLock::new(false),
        }
    }

    /// Subscribe to committed changes from this point on.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeRecord> {
        self.feed.subscribe()
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    /// Number of stored items across all partitions.
    pub async fn len(&self) -> usize {
        self.partitions.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every item whose `ttl` is at or before `now`, emitting REMOVE
    /// records. Returns the number of expired items.
    pub async fn expire(&self, now: i64) -> usize {
        let mut partitions = self.partitions.write().await;
        let mut expired = 0;

        for (pk, partition) in partitions.iter_mut() {
            let due: Vec<String> = partition
                .iter()
                .filter(|(_, item)| {
                    item.get(TTL_ATTR)
                        .and_then(Value::as_i64)
                        .is_some_and(|ttl| ttl <= now)
                })
                .map(|(sk, _)| sk.clone())
                .collect();

            for sk in due {
                if let Some(old) = partition.remove(&sk) {
                    expired += 1;
                    self.emit(ChangeKind::Remove, TableKey::new(pk.clone(), sk), None, Some(old));
                }
            }
        }
        partitions.retain(|_, partition| !partition.is_empty());

        if expired > 0 {
            debug!(expired, "Expired items past their ttl");
        }
        expired
    }

    fn emit(&self, kind: ChangeKind, key: TableKey, new_image: Option<Item>, old_image: Option<Item>) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = ChangeRecord {
            event_id: Uuid::new_v4().simple().to_string(),
            kind,
            key,
            new_image,
            old_image,
            sequence_number: format!("{:021}", sequence),
            approximate_creation: unix_now(),
        };
        // No subscribers is fine: nothing is consuming the feed yet.
        let _ = self.feed.send(record);
    }

    async fn check_write(&self) -> Result<()> {
        if *self.fail_on_write.read().await {
            return Err(StorageError::Unavailable("Mock write failure".to_string()));
        }
        Ok(())
    }

    async fn check_read(&self) -> Result<()> {
        if *self.fail_on_read.read().await {
            return Err(StorageError::Unavailable("Mock read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Table for MemoryTable {
    async fn get(&self, key: &TableKey) -> Result<Option<Item>> {
        self.check_read().await?;
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(&key.pk)
            .and_then(|partition| partition.get(&key.sk))
            .cloned())
    }

    async fn update_if(
        &self,
        key: &TableKey,
        attributes: Item,
        condition: &Condition,
    ) -> Result<ConditionalOutcome> {
        self.check_write().await?;
        let mut partitions = self.partitions.write().await;
        let partition = partitions.entry(key.pk.clone()).or_default();
        let existing = partition.get(&key.sk);

        if !condition.evaluate(existing) {
            if partition.is_empty() {
                partitions.remove(&key.pk);
            }
            return Ok(ConditionalOutcome::ConditionFailed);
        }

        let old = existing.cloned();
        let mut merged = old.clone().unwrap_or_default();
        merged.extend(attributes);
        merged.insert(PK_ATTR.to_string(), Value::String(key.pk.clone()));
        merged.insert(SK_ATTR.to_string(), Value::String(key.sk.clone()));

        if old.as_ref() == Some(&merged) {
            return Ok(ConditionalOutcome::Applied);
        }

        partition.insert(key.sk.clone(), merged.clone());
        let kind = if old.is_some() {
            ChangeKind::Modify
        } else {
            ChangeKind::Insert
        };
        self.emit(kind, key.clone(), Some(merged), old);

        Ok(ConditionalOutcome::Applied)
    }

    async fn delete(&self, key: &TableKey) -> Result<Option<Item>> {
        self.check_write().await?;
        let mut partitions = self.partitions.write().await;
        let Some(partition) = partitions.get_mut(&key.pk) else {
            return Ok(None);
        };
        let removed = partition.remove(&key.sk);
        if partition.is_empty() {
            partitions.remove(&key.pk);
        }

        if let Some(old) = &removed {
            self.emit(ChangeKind::Remove, key.clone(), None, Some(old.clone()));
        }
        Ok(removed)
    }

    async fn query(
        &self,
        query: &KeyQuery,
        exclusive_start: Option<&TableKey>,
        limit: usize,
    ) -> Result<QueryPage> {
        self.check_read().await?;
        let partitions = self.partitions.read().await;
        let Some(partition) = partitions.get(&query.partition) else {
            return Ok(QueryPage::default());
        };

        let lower = match exclusive_start {
            Some(start) => Bound::Excluded(start.sk.clone()),
            None => match &query.prefix {
                Some(prefix) => Bound::Included(prefix.clone()),
                None => Bound::Unbounded,
            },
        };

        let mut matching = partition
            .range::<String, _>((lower, Bound::Unbounded))
            .skip_while(|(sk, _)| !query.matches_sk(sk))
            .take_while(|(sk, _)| query.matches_sk(sk));

        let items: Vec<Item> = matching
            .by_ref()
            .take(limit.max(1))
            .map(|(_, item)| item.clone())
            .collect();
        let has_more = matching.next().is_some();

        let last_evaluated = if has_more {
            items.last().and_then(|item| {
                let sk = item.get(SK_ATTR).and_then(Value::as_str)?;
                Some(TableKey::new(query.partition.clone(), sk))
            })
        } else {
            None
        };

        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }
}

#[cfg(test)]
mod tests;
