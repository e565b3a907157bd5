//! dashboard-listener: apply one inbound domain event.
//!
//! Reads a domain event (`{"id", "type", "source", "timestamp", "data"}`)
//! from stdin and writes it to the shared table through the oplock guard.
//! Exits non-zero only when an undeliverable event cannot be dead-lettered.
//!
//! ## Configuration
//! - DASHBOARD_CONFIG: YAML config file (optional)
//! - DASHBOARD__STORAGE__TYPE: memory | dynamo
//! - DASHBOARD_LOG: log filter (default: info)

use std::io::Read;

use tracing::info;

use dashboard_mgt::config::Config;
use dashboard_mgt::dlq::create_publisher;
use dashboard_mgt::event::DomainEvent;
use dashboard_mgt::runtime::{build_listener, build_table};
use dashboard_mgt::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = Config::load(None)?;

    let mut body = String::new();
    std::io::stdin().read_to_string(&mut body)?;
    let event: DomainEvent = serde_json::from_str(&body)?;

    let table = build_table(&config.storage).await?;
    let (dlq, _) = create_publisher(&config.dlq);
    let listener = build_listener(&config, table, dlq);
    let outcome = listener.deliver(&event).await?;

    info!(event = %event, outcome = ?outcome, "Event handled");
    Ok(())
}
