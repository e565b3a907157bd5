//! Shared fixtures for integration tests.
//!
//! Wires the in-memory table, mock bus and channel dead-letter queue into a
//! full pipeline: writes go through the repository, the change feed is pumped
//! into the trigger, and published events land on the mock bus.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use dashboard_mgt::bus::MockEventBus;
use dashboard_mgt::config::TriggerConfig;
use dashboard_mgt::dlq::{ChannelDeadLetterPublisher, DeadLetter};
use dashboard_mgt::entity::{
    Address, Agency, ElementType, Inspection, InspectionStatus, Model, Property, RecordMeta, Room,
    RoomElement, RoomElementTemplate, RoomTemplate,
};
use dashboard_mgt::event::DomainEvent;
use dashboard_mgt::storage::MemoryTable;
use dashboard_mgt::trigger::{self, BatchReport, EventRegistry, FeedPump, Trigger};
use dashboard_mgt::Repository;

pub const SOURCE: &str = "dashboard-mgt";

/// A running pipeline over a fresh in-memory table.
pub struct Pipeline {
    pub table: Arc<MemoryTable>,
    pub repository: Repository,
    pub bus: Arc<MockEventBus>,
    pub dead_letters: mpsc::UnboundedReceiver<DeadLetter>,
    pump: JoinHandle<trigger::Result<BatchReport>>,
}

impl Pipeline {
    pub fn start() -> Self {
        let table = Arc::new(MemoryTable::new());
        let bus = Arc::new(MockEventBus::new());
        let (dlq, dead_letters) = ChannelDeadLetterPublisher::new();
        let trigger = Trigger::new(
            Arc::new(EventRegistry::standard()),
            bus.clone(),
            Arc::new(dlq),
            SOURCE,
            TriggerConfig {
                min_delay_ms: 1,
                max_delay_ms: 5,
                ..TriggerConfig::default()
            },
        );
        let pump = FeedPump::new(Arc::new(trigger), 16).spawn(table.subscribe_changes());

        Self {
            repository: Repository::with_page_size(table.clone(), 2),
            table,
            bus,
            dead_letters,
            pump,
        }
    }

    /// Wait until at least `count` events were published.
    pub async fn published(&self, count: usize) -> Vec<DomainEvent> {
        for _ in 0..200 {
            if self.bus.published_count().await >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.bus.published().await
    }

    /// Close the feed, wait for the pump to drain it and return its totals.
    pub async fn finish(self) -> (BatchReport, Arc<MockEventBus>) {
        let Self {
            table,
            repository,
            bus,
            pump,
            ..
        } = self;
        drop(repository);
        drop(table);
        let report = pump
            .await
            .expect("pump task panicked")
            .expect("pump stopped on a failed batch");
        (report, bus)
    }
}

pub fn address() -> Address {
    Address {
        number: "3".to_string(),
        street: "Quai Saint-Antoine".to_string(),
        city: "Lyon".to_string(),
        zip_code: "69002".to_string(),
        country: "France".to_string(),
    }
}

pub fn agency(agency_id: &str, oplock: Option<i64>) -> Agency {
    Agency {
        agency_id: agency_id.to_string(),
        name: format!("Agency {}", agency_id),
        contact_mail: format!("contact@{}.test", agency_id),
        contact_phone: Some("+33 4 00 00 00 00".to_string()),
        address: address(),
        meta: RecordMeta {
            oplock,
            ..RecordMeta::default()
        },
    }
}

fn rooms() -> Vec<RoomTemplate> {
    vec![RoomTemplate {
        name: "Bedroom".to_string(),
        area: Some(11.0),
        description: None,
        elements: vec![RoomElementTemplate {
            name: "Window".to_string(),
            description: None,
            images: None,
            element_type: ElementType::Structural,
        }],
    }]
}

pub fn property(agency_id: &str, property_id: &str) -> Property {
    Property {
        property_id: property_id.to_string(),
        agency_id: agency_id.to_string(),
        address: address(),
        owner: None,
        rooms: rooms(),
        meta: RecordMeta::stamped(1),
    }
}

pub fn model(agency_id: &str, model_id: &str) -> Model {
    Model {
        agency_id: agency_id.to_string(),
        model_id: model_id.to_string(),
        name: "Studio".to_string(),
        rooms: rooms(),
        meta: RecordMeta::stamped(1),
    }
}

pub fn inspection(agency_id: &str, property_id: &str, inspection_id: &str) -> Inspection {
    Inspection {
        inspection_id: inspection_id.to_string(),
        property_id: property_id.to_string(),
        agency_id: agency_id.to_string(),
        status: InspectionStatus::InProgress,
        inspector_id: "inspector-7".to_string(),
        date: "2024-06-12".to_string(),
        rooms: None,
        meta: RecordMeta::stamped(1),
    }
}

pub fn room(property_id: &str, room_id: &str) -> Room {
    Room {
        agency_id: "a1".to_string(),
        property_id: property_id.to_string(),
        room_id: room_id.to_string(),
        name: format!("Room {}", room_id),
        description: None,
        area: Some(10.0),
        meta: RecordMeta::stamped(1),
    }
}

pub fn element(property_id: &str, room_id: &str, element_id: &str) -> RoomElement {
    RoomElement {
        agency_id: "a1".to_string(),
        property_id: property_id.to_string(),
        room_id: room_id.to_string(),
        element_id: element_id.to_string(),
        name: format!("Element {}", element_id),
        description: None,
        element_type: ElementType::Furniture,
        meta: RecordMeta::stamped(1),
    }
}
