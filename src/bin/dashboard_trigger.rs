//! dashboard-trigger: handle one change-stream batch.
//!
//! Reads a change-stream batch (`{"Records": [...]}`) from stdin, publishes
//! one domain event per recognised change and exits non-zero when the batch
//! must be redelivered.
//!
//! ## Configuration
//! - DASHBOARD_CONFIG: YAML config file (optional)
//! - DASHBOARD__MESSAGING__TYPE: channel | sns-sqs
//! - DASHBOARD_LOG: log filter (default: info)

use std::io::Read;
use std::sync::Arc;

use tracing::{error, info};

use dashboard_mgt::config::Config;
use dashboard_mgt::dlq::create_publisher;
use dashboard_mgt::runtime::{build_bus, build_trigger};
use dashboard_mgt::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = Config::load(None)?;

    let mut batch = String::new();
    std::io::stdin().read_to_string(&mut batch)?;

    let bus = build_bus(&config.messaging, Vec::new()).await?;
    let (dlq, _) = create_publisher(&config.dlq);
    let trigger = Arc::new(build_trigger(&config, bus, dlq));

    match trigger.handle_stream_json(&batch).await {
        Ok(report) => {
            info!(
                published = report.published,
                ignored = report.ignored,
                dead_lettered = report.dead_lettered,
                "Batch handled"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Batch failed");
            Err(e.into())
        }
    }
}
