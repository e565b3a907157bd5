//! dashboard-standalone: the whole pipeline in one process.
//!
//! ```text
//! Repository/Listener --(WriteGuard)--> MemoryTable
//!                                           | change feed
//!                                           v
//!                                  FeedPump -> Trigger --> ChannelEventBus
//!                                                              |
//!                                  Listener <--(AgencyCreated)--+
//! ```
//!
//! ## Configuration
//! - First argument or DASHBOARD_CONFIG: YAML config file (optional)
//! - DASHBOARD__*: overrides, e.g. DASHBOARD__TRIGGER__MAX_ATTEMPTS=5
//! - DASHBOARD_LOG: log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use dashboard_mgt::bus::{ChannelEventBus, EventBus};
use dashboard_mgt::config::Config;
use dashboard_mgt::dlq::create_publisher;
use dashboard_mgt::listener::ListenerHandler;
use dashboard_mgt::runtime::{build_listener, build_trigger};
use dashboard_mgt::storage::MemoryTable;
use dashboard_mgt::trigger::FeedPump;
use dashboard_mgt::utils::bootstrap::init_tracing;
use dashboard_mgt::utils::clock::unix_now;

/// How often expired items are swept from the table.
const EXPIRY_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let table = Arc::new(MemoryTable::new());
    let feed = table.subscribe_changes();

    let bus = ChannelEventBus::publisher();
    let (dlq, dead_letters) = create_publisher(&config.dlq);
    if let Some(mut dead_letters) = dead_letters {
        tokio::spawn(async move {
            while let Some(dead_letter) = dead_letters.recv().await {
                error!(
                    subject = %dead_letter.payload.subject(),
                    reason = %dead_letter.reason,
                    "Dead letter received"
                );
            }
        });
    }

    let listener = Arc::new(build_listener(&config, table.clone(), dlq.clone()));
    let inbound = bus.with_filters(config.messaging.subscribe.clone());
    inbound
        .subscribe(Box::new(ListenerHandler::new(listener)))
        .await?;
    inbound.start_consuming().await?;

    let trigger = Arc::new(build_trigger(&config, Arc::new(bus), dlq));
    let mut pump = FeedPump::new(trigger, config.trigger.batch_size).spawn(feed);

    let sweeper = {
        let table = table.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(EXPIRY_INTERVAL);
            loop {
                interval.tick().await;
                table.expire(unix_now()).await;
            }
        })
    };

    info!(source = %config.messaging.source, "dashboard-standalone started");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down");
            sweeper.abort();
            pump.abort();
            Ok(())
        }
        finished = &mut pump => {
            sweeper.abort();
            match finished? {
                Ok(report) => {
                    info!(published = report.published, "Change feed closed");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %e, "Feed pump stopped");
                    Err(e.into())
                }
            }
        }
    }
}
