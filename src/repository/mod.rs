//! Typed entity repository.
//!
//! Caller-facing reads and writes over the shared table. All writes go
//! through the `WriteGuard`; conflicts are outcomes, not errors.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DEFAULT_QUERY_PAGE_SIZE;
use crate::entity::{
    decode, discriminator_of, Entity, EntityId, KeyQuery, DELETED_ATTR, OPLOCK_ATTR, TTL_ATTR,
};
use crate::guard::{oplock_now, WriteGuard, WriteOutcome};
use crate::storage::{list_children, Item, Result, Table};

/// Repository over the shared table.
#[derive(Clone)]
pub struct Repository {
    guard: WriteGuard,
    page_size: usize,
}

impl Repository {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self::with_page_size(table, DEFAULT_QUERY_PAGE_SIZE)
    }

    /// Create a repository that lists children `page_size` items per query.
    pub fn with_page_size(table: Arc<dyn Table>, page_size: usize) -> Self {
        Self {
            guard: WriteGuard::new(table),
            page_size: page_size.max(1),
        }
    }

    pub fn guard(&self) -> &WriteGuard {
        &self.guard
    }

    fn table(&self) -> &Arc<dyn Table> {
        self.guard.table()
    }

    /// Write an entity carrying the oplock the caller last observed.
    ///
    /// A stale write is dropped without telling the caller.
    pub async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        if self.write(entity).await? == WriteOutcome::Rejected {
            debug!(kind = %E::KIND, id = ?entity.id(), "Update lost to a newer write");
        }
        Ok(())
    }

    /// Write an entity and report whether it committed.
    pub async fn write<E: Entity>(&self, entity: &E) -> Result<WriteOutcome> {
        self.guard.write_entity(entity).await
    }

    /// Stamp the entity's oplock with the current time and write it.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<WriteOutcome> {
        entity.meta_mut().oplock = Some(oplock_now());
        self.write(entity).await
    }

    /// Point lookup.
    pub async fn get<E: Entity>(&self, id: &E::Id) -> Result<Option<E>> {
        let key = id.key()?;
        match self.table().get(&key).await? {
            Some(item) => Ok(Some(decode(&item)?)),
            None => Ok(None),
        }
    }

    /// Hard delete, returning the removed entity.
    pub async fn delete<E: Entity>(&self, id: &E::Id) -> Result<Option<E>> {
        let key = id.key()?;
        match self.table().delete(&key).await? {
            Some(item) => Ok(Some(decode(&item)?)),
            None => Ok(None),
        }
    }

    /// Every entity of type `E` matched by the query, across all pages.
    ///
    /// Items of other kinds sharing the partition are skipped.
    pub async fn list<E: Entity>(&self, query: &KeyQuery) -> Result<Vec<E>> {
        let items = list_children(self.table().as_ref(), query, self.page_size).await?;
        let mut entities = Vec::with_capacity(items.len());
        for item in items {
            match discriminator_of(&item) {
                Some(tag) if tag == E::KIND.as_str() => entities.push(decode(&item)?),
                Some(_) => {}
                None => warn!(partition = %query.partition, "Skipping item without discriminator"),
            }
        }
        Ok(entities)
    }

    /// Soft delete: flag the record deleted and let the store expire it
    /// after `retention`. Guarded like any other write, and never creates a
    /// record: an absent id is reported as `Rejected`.
    pub async fn mark_deleted<E: Entity>(
        &self,
        id: &E::Id,
        oplock: i64,
        retention: Duration,
    ) -> Result<WriteOutcome> {
        let key = id.key()?;
        let retention = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
        let ttl = oplock_now().saturating_add(retention);

        let mut attributes = Item::new();
        attributes.insert(DELETED_ATTR.to_string(), Value::Bool(true));
        attributes.insert(TTL_ATTR.to_string(), Value::from(ttl));

        self.guard
            .write_existing(&key, E::KIND.as_str(), attributes, OPLOCK_ATTR, Some(oplock))
            .await
    }
}
