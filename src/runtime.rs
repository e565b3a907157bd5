//! Process wiring: builds backends and pipeline components from `Config`.
//!
//! Clients are constructed once per process and injected into the trigger,
//! listener and repository.

use std::sync::Arc;

use tracing::info;

use crate::bus::{ChannelEventBus, EventBus};
use crate::config::{Config, MessagingConfig, MessagingType, StorageConfig, StorageType};
use crate::dlq::DeadLetterPublisher;
use crate::guard::WriteGuard;
use crate::listener::{InboundRegistry, Listener};
use crate::repository::Repository;
use crate::storage::{MemoryTable, Table};
use crate::trigger::{EventRegistry, Trigger};

/// Boxed error returned by the wiring functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Initialize the shared table based on configuration.
pub async fn build_table(config: &StorageConfig) -> Result<Arc<dyn Table>, BoxError> {
    match config.storage_type {
        StorageType::Memory => {
            info!(storage_type = "memory", "Table initialized");
            Ok(Arc::new(MemoryTable::new()))
        }
        StorageType::Dynamo => {
            #[cfg(feature = "dynamo")]
            {
                let table = crate::storage::DynamoTable::new(&config.dynamo).await?;
                info!(
                    storage_type = "dynamo",
                    table = %config.dynamo.table_name,
                    "Table initialized"
                );
                Ok(Arc::new(table))
            }

            #[cfg(not(feature = "dynamo"))]
            {
                Err("DynamoDB support requires the 'dynamo' feature. Rebuild with --features dynamo".into())
            }
        }
    }
}

/// Initialize the event bus based on configuration.
///
/// `type_filters` select which received events reach subscribed handlers;
/// publishers pass an empty list.
pub async fn build_bus(
    config: &MessagingConfig,
    type_filters: Vec<String>,
) -> Result<Arc<dyn EventBus>, BoxError> {
    match config.messaging_type {
        MessagingType::Channel => {
            info!(messaging_type = "channel", "Event bus initialized");
            Ok(Arc::new(ChannelEventBus::new(type_filters)))
        }
        MessagingType::SnsSqs => {
            #[cfg(feature = "sns-sqs")]
            {
                use crate::bus::{SnsSqsConfig, SnsSqsEventBus};

                let bus_config = if type_filters.is_empty() {
                    SnsSqsConfig::publisher(config.sns_sqs.clone())
                } else {
                    SnsSqsConfig::subscriber(config.sns_sqs.clone(), type_filters)
                };
                let bus = SnsSqsEventBus::new(bus_config).await?;
                info!(messaging_type = "sns-sqs", "Event bus initialized");
                Ok(Arc::new(bus))
            }

            #[cfg(not(feature = "sns-sqs"))]
            {
                let _ = type_filters;
                Err("SNS/SQS support requires the 'sns-sqs' feature. Rebuild with --features sns-sqs".into())
            }
        }
    }
}

/// Change-feed consumer with every entity type registered.
pub fn build_trigger(
    config: &Config,
    bus: Arc<dyn EventBus>,
    dlq: Arc<dyn DeadLetterPublisher>,
) -> Trigger {
    Trigger::new(
        Arc::new(EventRegistry::standard()),
        bus,
        dlq,
        config.messaging.source.clone(),
        config.trigger.clone(),
    )
}

/// Inbound listener writing to `table`, dead-lettering to `dlq`.
pub fn build_listener(
    config: &Config,
    table: Arc<dyn Table>,
    dlq: Arc<dyn DeadLetterPublisher>,
) -> Listener {
    Listener::new(
        WriteGuard::new(table),
        InboundRegistry::standard(),
        config.listener.clone(),
        config.messaging.source.clone(),
    )
    .with_dead_letters(dlq)
}

/// Caller-facing repository over `table`.
pub fn build_repository(config: &Config, table: Arc<dyn Table>) -> Repository {
    Repository::with_page_size(table, config.storage.query_page_size)
}
