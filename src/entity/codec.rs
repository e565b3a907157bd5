//! Conversion between typed entities and stored items.

use serde_json::Value;

use super::{Entity, EntityKind, KeyError, TableKey, ENTITY_ATTR, PK_ATTR, SK_ATTR};
use crate::storage::Item;

/// Errors converting between entities and items.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Entity did not serialize to an object")]
    NotAnObject,

    #[error("Item is a '{found}', expected '{expected}'")]
    WrongKind {
        expected: EntityKind,
        found: String,
    },
}

/// Serialize an entity into its table key and full stored item.
///
/// The item carries the key attributes and the discriminator alongside the
/// entity's own attributes.
pub fn encode<E: Entity>(entity: &E) -> Result<(TableKey, Item), CodecError> {
    let key = entity.key()?;
    let mut item = match serde_json::to_value(entity)? {
        Value::Object(map) => map,
        _ => return Err(CodecError::NotAnObject),
    };
    item.insert(PK_ATTR.to_string(), Value::String(key.pk.clone()));
    item.insert(SK_ATTR.to_string(), Value::String(key.sk.clone()));
    item.insert(
        ENTITY_ATTR.to_string(),
        Value::String(E::KIND.as_str().to_string()),
    );
    Ok((key, item))
}

/// Deserialize a stored item into an entity.
///
/// Items without a discriminator are accepted; a discriminator naming another
/// kind is rejected.
pub fn decode<E: Entity>(item: &Item) -> Result<E, CodecError> {
    if let Some(found) = discriminator_of(item) {
        if found != E::KIND.as_str() {
            return Err(CodecError::WrongKind {
                expected: E::KIND,
                found: found.to_string(),
            });
        }
    }
    let body = strip_table_attributes(item.clone());
    Ok(serde_json::from_value(Value::Object(body))?)
}

/// The `_et` discriminator of an item, if any.
pub fn discriminator_of(item: &Item) -> Option<&str> {
    item.get(ENTITY_ATTR).and_then(Value::as_str)
}

/// Remove key attributes and the discriminator, leaving the entity body.
pub fn strip_table_attributes(mut item: Item) -> Item {
    item.remove(PK_ATTR);
    item.remove(SK_ATTR);
    item.remove(ENTITY_ATTR);
    item
}
