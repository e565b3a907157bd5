//! DynamoDB implementation of `Table`.
//!
//! Table schema:
//! - PK: partition key (String)
//! - SK: range key (String)
//! - every other attribute is stored as-is, JSON types mapped onto
//!   DynamoDB attribute values
//!
//! The change feed is the table's stream (NEW_AND_OLD_IMAGES); its batches
//! reach the consumer through `parse_stream_batch`.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::attribute_value::parse_number;
use super::{Condition, ConditionalOutcome, Item, QueryPage, Result, StorageError, Table};
use crate::config::DynamoConfig;
use crate::entity::{KeyQuery, TableKey, PK_ATTR, SK_ATTR};

type AttributeMap = HashMap<String, AttributeValue>;

/// DynamoDB implementation of `Table`.
#[derive(Clone)]
pub struct DynamoTable {
    client: Client,
    table_name: String,
}

impl std::fmt::Debug for DynamoTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoTable")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl DynamoTable {
    /// Connect using the default AWS provider chain plus config overrides.
    pub async fn new(config: &DynamoConfig) -> Result<Self> {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);

        if let Some(region) = &config.region {
            builder = builder.region(aws_sdk_dynamodb::config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());
        info!(table = %config.table_name, endpoint = ?config.endpoint_url, "Connected to DynamoDB");

        Ok(Self::from_client(client, config.table_name.clone()))
    }

    /// Create from a pre-built client.
    pub fn from_client(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    fn key_attributes(key: &TableKey) -> AttributeMap {
        HashMap::from([
            (PK_ATTR.to_string(), AttributeValue::S(key.pk.clone())),
            (SK_ATTR.to_string(), AttributeValue::S(key.sk.clone())),
        ])
    }
}

// ============================================================================
// Attribute conversion
// ============================================================================

/// Convert a JSON value to a DynamoDB attribute value.
pub fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(list) => AttributeValue::L(list.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attribute_map(map)),
    }
}

fn to_attribute_map(map: &Map<String, Value>) -> AttributeMap {
    map.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

/// Convert a DynamoDB attribute value to JSON.
pub fn from_attribute(value: &AttributeValue) -> Result<Value> {
    let invalid = |e: super::attribute_value::AttributeValueError| {
        StorageError::InvalidItem(e.to_string())
    };
    Ok(match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => parse_number(n).map_err(invalid)?,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::M(map) => Value::Object(from_attribute_map(map)?),
        AttributeValue::L(list) => Value::Array(
            list.iter()
                .map(from_attribute)
                .collect::<Result<Vec<_>>>()?,
        ),
        AttributeValue::Ss(list) => {
            Value::Array(list.iter().cloned().map(Value::String).collect())
        }
        AttributeValue::Ns(list) => Value::Array(
            list.iter()
                .map(|n| parse_number(n).map_err(invalid))
                .collect::<Result<Vec<_>>>()?,
        ),
        other => {
            return Err(StorageError::InvalidItem(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

fn from_attribute_map(map: &AttributeMap) -> Result<Item> {
    map.iter()
        .map(|(name, value)| Ok((name.clone(), from_attribute(value)?)))
        .collect()
}

// ============================================================================
// Expressions
// ============================================================================

/// A rendered update or condition expression with its placeholders.
#[derive(Debug, Default)]
struct Expression {
    names: HashMap<String, String>,
    values: AttributeMap,
}

impl Expression {
    fn name(&mut self, attr: &str) -> String {
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attr.to_string());
        placeholder
    }

    fn value(&mut self, value: AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value);
        placeholder
    }

    /// `SET #n0 = :v0, ...` over every non-key attribute; `None` when empty.
    fn set_clause(&mut self, attributes: &Item) -> Option<String> {
        let assignments: Vec<String> = attributes
            .iter()
            .filter(|(name, _)| name.as_str() != PK_ATTR && name.as_str() != SK_ATTR)
            .map(|(name, value)| {
                let name = self.name(name);
                let value = self.value(to_attribute(value));
                format!("{} = {}", name, value)
            })
            .collect();
        if assignments.is_empty() {
            None
        } else {
            Some(format!("SET {}", assignments.join(", ")))
        }
    }

    fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::AttributeNotExists(attr) => {
                format!("attribute_not_exists({})", self.name(attr))
            }
            Condition::AttributeExists(attr) => {
                format!("attribute_exists({})", self.name(attr))
            }
            Condition::AttributeAtMost(attr, bound) => {
                let name = self.name(attr);
                let value = self.value(AttributeValue::N(bound.to_string()));
                format!("{} <= {}", name, value)
            }
            Condition::Or(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" OR "))
            }
            Condition::And(conditions) => {
                let parts: Vec<String> = conditions.iter().map(|c| self.condition(c)).collect();
                format!("({})", parts.join(" AND "))
            }
        }
    }
}

fn backend_error<E, R>(operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = format!(
        "DynamoDB {} failed: {}",
        operation,
        aws_sdk_dynamodb::error::DisplayErrorContext(&err)
    );
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::Unavailable(message)
        }
        _ if message.contains("ProvisionedThroughputExceeded")
            || message.contains("RequestLimitExceeded")
            || message.contains("ThrottlingException") =>
        {
            StorageError::Throttled(message)
        }
        _ => StorageError::Backend(message),
    }
}

#[async_trait]
impl Table for DynamoTable {
    async fn get(&self, key: &TableKey) -> Result<Option<Item>> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| backend_error("GetItem", e))?;

        response.item().map(from_attribute_map).transpose()
    }

    async fn update_if(
        &self,
        key: &TableKey,
        attributes: Item,
        condition: &Condition,
    ) -> Result<ConditionalOutcome> {
        let mut expression = Expression::default();
        let update = expression.set_clause(&attributes);
        let condition_expression = expression.condition(condition);

        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .condition_expression(condition_expression)
            .set_update_expression(update);
        if !expression.names.is_empty() {
            request = request.set_expression_attribute_names(Some(expression.names));
        }
        if !expression.values.is_empty() {
            request = request.set_expression_attribute_values(Some(expression.values));
        }

        match request.send().await {
            Ok(_) => Ok(ConditionalOutcome::Applied),
            Err(SdkError::ServiceError(service_err))
                if matches!(
                    service_err.err(),
                    UpdateItemError::ConditionalCheckFailedException(_)
                ) =>
            {
                debug!(%key, "DynamoDB condition check failed");
                Ok(ConditionalOutcome::ConditionFailed)
            }
            Err(e) => Err(backend_error("UpdateItem", e)),
        }
    }

    async fn delete(&self, key: &TableKey) -> Result<Option<Item>> {
        let response = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::key_attributes(key)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| backend_error("DeleteItem", e))?;

        response.attributes().map(from_attribute_map).transpose()
    }

    async fn query(
        &self,
        query: &KeyQuery,
        exclusive_start: Option<&TableKey>,
        limit: usize,
    ) -> Result<QueryPage> {
        let mut expression = Expression::default();
        let pk = expression.name(PK_ATTR);
        let partition = expression.value(AttributeValue::S(query.partition.clone()));
        let mut key_condition = format!("{} = {}", pk, partition);
        if let Some(prefix) = &query.prefix {
            let sk = expression.name(SK_ATTR);
            let prefix = expression.value(AttributeValue::S(prefix.clone()));
            key_condition = format!("{} AND begins_with({}, {})", key_condition, sk, prefix);
        }

        let response = self
            .client
            .query()
            .table_name(&self.table_name)
            .key_condition_expression(key_condition)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .set_exclusive_start_key(exclusive_start.map(Self::key_attributes))
            .limit(i32::try_from(limit.max(1)).unwrap_or(i32::MAX))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| backend_error("Query", e))?;

        let items = response
            .items()
            .iter()
            .map(from_attribute_map)
            .collect::<Result<Vec<_>>>()?;

        let last_evaluated = match response.last_evaluated_key() {
            Some(key) if !key.is_empty() => {
                let attr = |name: &str| {
                    key.get(name)
                        .and_then(|v| v.as_s().ok())
                        .cloned()
                        .ok_or_else(|| {
                            StorageError::InvalidItem(format!("LastEvaluatedKey missing {}", name))
                        })
                };
                Some(TableKey::new(attr(PK_ATTR)?, attr(SK_ATTR)?))
            }
            _ => None,
        };

        Ok(QueryPage {
            items,
            last_evaluated,
        })
    }
}
