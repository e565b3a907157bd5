//! Optimistic write guard.
//!
//! Every write, for every entity type, goes through `WriteGuard::write`: a
//! single conditional upsert that commits only when
//!
//! ```text
//! attribute_not_exists(oplock) OR oplock <= :supplied
//! ```
//!
//! A write that fails the condition is discarded and reported as
//! `WriteOutcome::Rejected`, never as an error.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::entity::{encode, Entity, TableKey, ENTITY_ATTR, OPLOCK_ATTR, PK_ATTR, SK_ATTR};
use crate::storage::{Condition, ConditionalOutcome, Item, Result, Table};
use crate::utils::clock::unix_now;

/// Oplock for a write accepted now.
pub fn oplock_now() -> i64 {
    unix_now()
}

/// Outcome of a guarded write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was applied.
    Committed,
    /// A newer write is stored; this one was discarded.
    Rejected,
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed)
    }
}

/// The oplock write condition.
///
/// With no supplied oplock only a never-stamped record can be written.
pub fn oplock_condition(oplock_field: &str, oplock: Option<i64>) -> Condition {
    let absent = Condition::AttributeNotExists(oplock_field.to_string());
    match oplock {
        Some(supplied) => Condition::Or(vec![
            absent,
            Condition::AttributeAtMost(oplock_field.to_string(), supplied),
        ]),
        None => absent,
    }
}

/// Conditional write path shared by every entity type.
#[derive(Clone)]
pub struct WriteGuard {
    table: Arc<dyn Table>,
}

impl WriteGuard {
    pub fn new(table: Arc<dyn Table>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<dyn Table> {
        &self.table
    }

    /// Conditionally upsert `attributes` at `key`.
    ///
    /// The discriminator is stored alongside the attributes, and the supplied
    /// oplock (when present) becomes the stored oplock on commit.
    pub async fn write(
        &self,
        key: &TableKey,
        discriminator: &str,
        attributes: Item,
        oplock_field: &str,
        oplock: Option<i64>,
    ) -> Result<WriteOutcome> {
        let condition = oplock_condition(oplock_field, oplock);
        self.write_when(key, discriminator, attributes, oplock_field, oplock, condition)
            .await
    }

    /// Like `write`, but never creates the item. An absent key is reported
    /// as `Rejected`.
    pub async fn write_existing(
        &self,
        key: &TableKey,
        discriminator: &str,
        attributes: Item,
        oplock_field: &str,
        oplock: Option<i64>,
    ) -> Result<WriteOutcome> {
        let condition = Condition::And(vec![
            Condition::AttributeExists(PK_ATTR.to_string()),
            oplock_condition(oplock_field, oplock),
        ]);
        self.write_when(key, discriminator, attributes, oplock_field, oplock, condition)
            .await
    }

    async fn write_when(
        &self,
        key: &TableKey,
        discriminator: &str,
        mut attributes: Item,
        oplock_field: &str,
        oplock: Option<i64>,
        condition: Condition,
    ) -> Result<WriteOutcome> {
        attributes.remove(PK_ATTR);
        attributes.remove(SK_ATTR);
        attributes.insert(
            ENTITY_ATTR.to_string(),
            Value::String(discriminator.to_string()),
        );
        if let Some(supplied) = oplock {
            attributes.insert(oplock_field.to_string(), Value::from(supplied));
        }

        match self.table.update_if(key, attributes, &condition).await? {
            ConditionalOutcome::Applied => {
                debug!(%key, discriminator, ?oplock, "Write committed");
                Ok(WriteOutcome::Committed)
            }
            ConditionalOutcome::ConditionFailed => {
                debug!(%key, discriminator, ?oplock, "Stale write discarded");
                Ok(WriteOutcome::Rejected)
            }
        }
    }

    /// Write an entity using its own key, discriminator and oplock.
    pub async fn write_entity<E: Entity>(&self, entity: &E) -> Result<WriteOutcome> {
        let (key, item) = encode(entity)?;
        self.write(&key, E::KIND.as_str(), item, OPLOCK_ATTR, entity.oplock())
            .await
    }
}
