//! AWS SNS/SQS event bus implementation.
//!
//! Publishes every domain event as a JSON message on one SNS topic, with the
//! event type as a message attribute. Subscribers consume from one SQS queue
//! subscribed to that topic.
//!
//! SNS filter policies are not used; type filtering happens subscribe-side
//! via `type_matches_any`. A message is deleted once handled or filtered out;
//! on handler failure it is left for redelivery after the visibility timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sns::Client as SnsClient;
use aws_sdk_sqs::Client as SqsClient;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use super::{process_message, BusError, EventBus, EventHandler, Result};
use crate::config::SnsSqsSettings;
use crate::event::DomainEvent;

/// Message attribute carrying the event type.
const TYPE_ATTR: &str = "type";

/// Message attribute carrying the event source.
const SOURCE_ATTR: &str = "source";

/// Configuration for an SNS/SQS bus instance.
#[derive(Clone, Debug)]
pub struct SnsSqsConfig {
    pub settings: SnsSqsSettings,
    /// Event type filters for consuming; empty accepts every type.
    pub type_filters: Vec<String>,
}

impl SnsSqsConfig {
    /// Create config for publishing only.
    pub fn publisher(settings: SnsSqsSettings) -> Self {
        Self {
            settings,
            type_filters: Vec::new(),
        }
    }

    /// Create config for consuming the given event types.
    pub fn subscriber(settings: SnsSqsSettings, type_filters: Vec<String>) -> Self {
        Self {
            settings,
            type_filters,
        }
    }
}

/// AWS SNS/SQS event bus implementation.
pub struct SnsSqsEventBus {
    sns: SnsClient,
    sqs: SqsClient,
    config: SnsSqsConfig,
    handlers: Arc<RwLock<Vec<Box<dyn EventHandler>>>>,
    /// Cached topic ARN.
    topic_arn: RwLock<Option<String>>,
}

impl SnsSqsEventBus {
    /// Create a new SNS/SQS event bus.
    pub async fn new(config: SnsSqsConfig) -> Result<Self> {
        let mut aws_config_builder = aws_config::defaults(BehaviorVersion::latest());

        if let Some(ref region) = config.settings.region {
            aws_config_builder =
                aws_config_builder.region(aws_config::Region::new(region.clone()));
        }

        if let Some(ref endpoint) = config.settings.endpoint_url {
            aws_config_builder = aws_config_builder.endpoint_url(endpoint);
        }

        let aws_config = aws_config_builder.load().await;

        info!(
            region = ?config.settings.region,
            endpoint = ?config.settings.endpoint_url,
            topic = %config.settings.topic,
            "Connected to AWS SNS/SQS"
        );

        Ok(Self {
            sns: SnsClient::new(&aws_config),
            sqs: SqsClient::new(&aws_config),
            config,
            handlers: Arc::new(RwLock::new(Vec::new())),
            topic_arn: RwLock::new(None),
        })
    }

    /// Get or create the SNS topic, caching its ARN.
    async fn topic_arn(&self) -> Result<String> {
        if let Some(arn) = self.topic_arn.read().await.as_ref() {
            return Ok(arn.clone());
        }

        // create_topic is idempotent and returns the existing ARN.
        let result = self
            .sns
            .create_topic()
            .name(&self.config.settings.topic)
            .send()
            .await
            .map_err(|e| BusError::Connection(format!("Failed to create SNS topic: {}", e)))?;

        let arn = result
            .topic_arn()
            .ok_or_else(|| BusError::Connection("SNS create_topic returned no ARN".to_string()))?
            .to_string();

        *self.topic_arn.write().await = Some(arn.clone());
        info!(topic = %self.config.settings.topic, arn = %arn, "Created/found SNS topic");
        Ok(arn)
    }

    /// Get or create the SQS queue and subscribe it to the topic.
    async fn prepare_queue(&self) -> Result<String> {
        let settings = &self.config.settings;
        let result = self
            .sqs
            .create_queue()
            .queue_name(&settings.queue)
            .attributes(
                aws_sdk_sqs::types::QueueAttributeName::VisibilityTimeout,
                settings.visibility_timeout_secs.to_string(),
            )
            .send()
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to create SQS queue: {}", e)))?;

        let queue_url = result
            .queue_url()
            .ok_or_else(|| BusError::Subscribe("SQS create_queue returned no URL".to_string()))?
            .to_string();

        let queue_attrs = self
            .sqs
            .get_queue_attributes()
            .queue_url(&queue_url)
            .attribute_names(aws_sdk_sqs::types::QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to get queue ARN: {}", e)))?;

        let queue_arn = queue_attrs
            .attributes()
            .and_then(|attrs| attrs.get(&aws_sdk_sqs::types::QueueAttributeName::QueueArn))
            .ok_or_else(|| BusError::Subscribe("Queue has no ARN attribute".to_string()))?;

        let topic_arn = self.topic_arn().await?;
        self.sns
            .subscribe()
            .topic_arn(&topic_arn)
            .protocol("sqs")
            .endpoint(queue_arn)
            .attributes("RawMessageDelivery", "true")
            .send()
            .await
            .map_err(|e| BusError::Subscribe(format!("Failed to subscribe queue to topic: {}", e)))?;

        info!(queue = %settings.queue, url = %queue_url, topic_arn = %topic_arn, "Subscribed SQS queue to topic");
        Ok(queue_url)
    }
}

fn string_attribute(value: &str) -> Result<aws_sdk_sns::types::MessageAttributeValue> {
    aws_sdk_sns::types::MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| BusError::Publish(format!("Failed to build attribute: {}", e)))
}

#[async_trait]
impl EventBus for SnsSqsEventBus {
    #[tracing::instrument(name = "bus.publish", skip_all, fields(event_type = %event.event_type))]
    async fn publish(&self, event: Arc<DomainEvent>) -> Result<()> {
        let topic_arn = self.topic_arn().await?;
        let message = serde_json::to_string(event.as_ref())?;

        let mut attrs = HashMap::new();
        attrs.insert(TYPE_ATTR.to_string(), string_attribute(&event.event_type)?);
        attrs.insert(SOURCE_ATTR.to_string(), string_attribute(&event.source)?);

        self.sns
            .publish()
            .topic_arn(&topic_arn)
            .message(message)
            .set_message_attributes(Some(attrs))
            .send()
            .await
            .map_err(|e| BusError::Publish(format!("Failed to publish to SNS: {}", e)))?;

        debug!(event_id = %event.id, topic_arn = %topic_arn, "Published event to SNS");
        Ok(())
    }

    async fn subscribe(&self, handler: Box<dyn EventHandler>) -> Result<()> {
        self.handlers.write().await.push(handler);
        Ok(())
    }

    async fn start_consuming(&self) -> Result<()> {
        let queue_url = self.prepare_queue().await?;

        let handlers = self.handlers.clone();
        let sqs = self.sqs.clone();
        let filters = self.config.type_filters.clone();
        let max_messages = self.config.settings.max_messages;
        let wait_time_secs = self.config.settings.wait_time_secs;

        tokio::spawn(async move {
            info!(queue_url = %queue_url, "Starting SQS consumer");

            loop {
                let output = match sqs
                    .receive_message()
                    .queue_url(&queue_url)
                    .max_number_of_messages(max_messages)
                    .wait_time_seconds(wait_time_secs)
                    .send()
                    .await
                {
                    Ok(output) => output,
                    Err(e) => {
                        error!(error = %e, "Failed to receive messages from SQS");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for message in output.messages() {
                    let Some(body) = message.body() else {
                        continue;
                    };

                    let result = process_message(body, &filters, &handlers).await;
                    if !result.should_ack() {
                        debug!("Message will be retried after visibility timeout");
                        continue;
                    }

                    if let Some(receipt) = message.receipt_handle() {
                        if let Err(e) = sqs
                            .delete_message()
                            .queue_url(&queue_url)
                            .receipt_handle(receipt)
                            .send()
                            .await
                        {
                            error!(error = %e, "Failed to delete SQS message");
                        }
                    }
                }
            }
        });

        info!(type_filters = ?self.config.type_filters, "Started SQS consumer");
        Ok(())
    }
}
