//! dashboard-mgt - shared-table record store with change-feed domain events.
//!
//! Agencies, properties, rooms, room elements, inspections and model templates
//! live in one key-value table. Every write goes through an oplock guard, and
//! every committed mutation flows out of the table's change feed as a typed
//! domain event.

pub mod bus;
pub mod config;
pub mod dlq;
pub mod entity;
pub mod event;
pub mod guard;
pub mod listener;
pub mod repository;
pub mod runtime;
pub mod storage;
pub mod trigger;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use entity::{Entity, EntityId, EntityKind, KeyQuery, TableKey};
pub use event::DomainEvent;
pub use guard::{WriteGuard, WriteOutcome};
pub use repository::Repository;
