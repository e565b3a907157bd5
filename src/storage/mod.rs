//! Shared-table storage boundary.
//!
//! This module contains:
//! - `Table` trait: point get, conditional attribute-merge upsert, delete and
//!   paged partition queries over the single shared table
//! - `Condition`: the write-condition algebra the oplock guard is built from
//! - `list_children`: page-through query helper
//! - Implementations: in-memory (with change feed) and DynamoDB

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::entity::{CodecError, KeyError, KeyQuery, TableKey};

pub mod attribute_value;
pub mod change;
pub mod memory;
mod query;

#[cfg(feature = "dynamo")]
pub mod dynamo;

pub use change::{parse_stream_batch, ChangeFeedError, ChangeKind, ChangeRecord};
#[cfg(feature = "dynamo")]
pub use dynamo::DynamoTable;
pub use memory::MemoryTable;
pub use query::list_children;

/// A stored item: top-level attribute name to JSON value.
pub type Item = Map<String, Value>;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// A failed write condition is not an error; see `ConditionalOutcome`.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Precondition evaluated atomically against the stored item before a write.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// No item, or the item lacks the attribute. A stored `null` counts as
    /// present, as it does for DynamoDB's `NULL` type.
    AttributeNotExists(String),
    /// The item exists and carries the attribute.
    AttributeExists(String),
    /// The attribute exists, is numeric and is `<=` the bound.
    AttributeAtMost(String, i64),
    /// Any of the inner conditions holds.
    Or(Vec<Condition>),
    /// Every inner condition holds.
    And(Vec<Condition>),
}

impl Condition {
    /// Evaluate against the currently stored item (`None` when absent).
    pub fn evaluate(&self, existing: Option<&Item>) -> bool {
        match self {
            Condition::AttributeNotExists(attr) => {
                existing.and_then(|item| item.get(attr)).is_none()
            }
            Condition::AttributeExists(attr) => {
                existing.and_then(|item| item.get(attr)).is_some()
            }
            Condition::AttributeAtMost(attr, bound) => existing
                .and_then(|item| item.get(attr))
                .and_then(Value::as_i64)
                .map_or(false, |stored| stored <= *bound),
            Condition::Or(conditions) => conditions.iter().any(|c| c.evaluate(existing)),
            Condition::And(conditions) => conditions.iter().all(|c| c.evaluate(existing)),
        }
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalOutcome {
    /// The condition held and the attributes were written.
    Applied,
    /// The condition did not hold; nothing was written.
    ConditionFailed,
}

/// One page of a partition query.
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    /// Items in ascending range-key order.
    pub items: Vec<Item>,
    /// Resume point; `None` once the query is exhausted.
    pub last_evaluated: Option<TableKey>,
}

/// Interface to the shared key-value table.
///
/// Implementations:
/// - `MemoryTable`: in-process table with broadcast change feed
/// - `DynamoTable`: AWS DynamoDB (change feed is the table's stream)
#[async_trait]
pub trait Table: Send + Sync {
    /// Point lookup. Absence is `Ok(None)`.
    async fn get(&self, key: &TableKey) -> Result<Option<Item>>;

    /// Conditionally upsert top-level attributes.
    ///
    /// Attributes present in `attributes` overwrite stored ones; attributes
    /// not mentioned are kept. Creates the item when absent.
    async fn update_if(
        &self,
        key: &TableKey,
        attributes: Item,
        condition: &Condition,
    ) -> Result<ConditionalOutcome>;

    /// Delete an item, returning the removed image. Absence is `Ok(None)`.
    async fn delete(&self, key: &TableKey) -> Result<Option<Item>>;

    /// Fetch one page of items in a partition, ordered by range key.
    async fn query(
        &self,
        query: &KeyQuery,
        exclusive_start: Option<&TableKey>,
        limit: usize,
    ) -> Result<QueryPage>;
}
