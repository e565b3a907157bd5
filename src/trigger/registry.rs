//! Discriminator to event mapper registry.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::entity::{
    decode, strip_table_attributes, Agency, CodecError, Entity, EntityKind, Inspection, Model,
    Property, Room, RoomElement,
};
use crate::storage::Item;

/// Turns a stored image of one entity type into event data.
pub trait EventMapper: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Validate the image against the entity type and return the event data.
    ///
    /// An error means the image can never be published; retrying won't help.
    fn event_data(&self, image: &Item) -> Result<Item, CodecError>;
}

/// Mapper for any `Entity`: the event data is the full image minus key
/// attributes and discriminator, accepted only if it decodes as `E`.
pub struct EntityEvents<E>(PhantomData<fn() -> E>);

impl<E> EntityEvents<E> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<E> Default for EntityEvents<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EventMapper for EntityEvents<E> {
    fn kind(&self) -> EntityKind {
        E::KIND
    }

    fn event_data(&self, image: &Item) -> Result<Item, CodecError> {
        decode::<E>(image)?;
        Ok(strip_table_attributes(image.clone()))
    }
}

/// Registry of event mappers keyed by discriminator, built once at startup.
#[derive(Clone, Default)]
pub struct EventRegistry {
    mappers: HashMap<&'static str, Arc<dyn EventMapper>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every entity type stored in the table.
    pub fn standard() -> Self {
        Self::new()
            .with::<Agency>()
            .with::<Property>()
            .with::<Room>()
            .with::<RoomElement>()
            .with::<Inspection>()
            .with::<Model>()
    }

    /// Register the generic mapper for an entity type.
    pub fn with<E: Entity>(self) -> Self {
        self.with_mapper(Arc::new(EntityEvents::<E>::new()))
    }

    /// Register a mapper, replacing any mapper for the same discriminator.
    pub fn with_mapper(mut self, mapper: Arc<dyn EventMapper>) -> Self {
        self.mappers.insert(mapper.kind().as_str(), mapper);
        self
    }

    pub fn get(&self, discriminator: &str) -> Option<&Arc<dyn EventMapper>> {
        self.mappers.get(discriminator)
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_standard_registers_every_kind() {
        let registry = EventRegistry::standard();
        assert_eq!(registry.len(), EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            assert_eq!(registry.get(kind.as_str()).unwrap().kind(), kind);
        }
        assert!(registry.get("Tenant").is_none());
    }

    #[test]
    fn test_entity_events_strip_table_attributes() {
        let image = json!({
            "PK": "PROPERTY#p1",
            "SK": "ROOM#r1",
            "_et": "Room",
            "agencyId": "a1",
            "propertyId": "p1",
            "roomId": "r1",
            "name": "Hall",
            "oplock": 3,
            "extra": "kept"
        });
        let data = EntityEvents::<Room>::new()
            .event_data(image.as_object().unwrap())
            .unwrap();

        assert!(data.get("PK").is_none());
        assert!(data.get("_et").is_none());
        assert_eq!(data["roomId"], json!("r1"));
        assert_eq!(data["oplock"], json!(3));
        assert_eq!(data["extra"], json!("kept"));
    }

    #[test]
    fn test_entity_events_reject_undecodable_image() {
        let image = json!({"_et": "Room", "roomId": "r1"});
        assert!(EntityEvents::<Room>::new()
            .event_data(image.as_object().unwrap())
            .is_err());
    }
}
