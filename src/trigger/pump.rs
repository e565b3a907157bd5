//! Feeds the in-memory change feed into the trigger in batches.

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{BatchReport, Result, Trigger, TriggerError};
use crate::storage::ChangeRecord;
use crate::utils::retry::publish_backoff;

/// Pulls change records off a broadcast feed and hands them to the trigger.
///
/// Waits for one record, then drains whatever else is already queued (up to
/// `batch_size`) so related changes land in the same batch.
///
/// A failed batch is retried whole with the trigger's backoff. Records it
/// already published are published again with the same event ids. When the
/// retries run out the pump stops and returns the error.
pub struct FeedPump {
    trigger: Arc<Trigger>,
    batch_size: usize,
}

impl FeedPump {
    pub fn new(trigger: Arc<Trigger>, batch_size: usize) -> Self {
        Self {
            trigger,
            batch_size: batch_size.max(1),
        }
    }

    /// Run until the feed closes. Returns the totals over all batches, or the
    /// first batch error that survived its retries.
    pub async fn run(self, mut feed: broadcast::Receiver<ChangeRecord>) -> Result<BatchReport> {
        let mut totals = BatchReport::default();

        loop {
            let first = match feed.recv().await {
                Ok(record) => record,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change feed lagged, records were dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let mut batch = vec![first];
            let mut closed = false;
            while batch.len() < self.batch_size {
                match feed.try_recv() {
                    Ok(record) => batch.push(record),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Change feed lagged, records were dropped");
                    }
                    Err(TryRecvError::Closed) => {
                        closed = true;
                        break;
                    }
                }
            }

            match self.handle_with_retry(batch).await {
                Ok(report) => totals.merge(report),
                Err(e) => {
                    error!(error = %e, "Change batch failed after retries, stopping feed pump");
                    return Err(e);
                }
            }

            if closed {
                break;
            }
        }

        info!(
            published = totals.published,
            ignored = totals.ignored,
            dead_lettered = totals.dead_lettered,
            "Change feed closed"
        );
        Ok(totals)
    }

    async fn handle_with_retry(&self, batch: Vec<ChangeRecord>) -> Result<BatchReport> {
        let trigger = &self.trigger;
        let batch = &batch;
        (|| async move { trigger.handle_batch(batch.clone()).await })
            .retry(publish_backoff(trigger.config()))
            .notify(|err: &TriggerError, dur: Duration| {
                warn!(error = %err, delay = ?dur, records = batch.len(), "Change batch failed, retrying");
            })
            .await
    }

    pub fn spawn(
        self,
        feed: broadcast::Receiver<ChangeRecord>,
    ) -> JoinHandle<Result<BatchReport>> {
        tokio::spawn(self.run(feed))
    }
}
