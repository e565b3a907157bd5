//! Storage configuration types.

use serde::Deserialize;

/// Default page size for partition queries.
pub const DEFAULT_QUERY_PAGE_SIZE: usize = 100;

/// Storage type discriminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// In-process table (standalone mode and tests).
    #[default]
    Memory,
    /// AWS DynamoDB table with a stream attached.
    Dynamo,
}

/// Storage configuration (discriminated union).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type discriminator.
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    /// DynamoDB-specific configuration.
    pub dynamo: DynamoConfig,
    /// Items fetched per query page.
    pub query_page_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            dynamo: DynamoConfig::default(),
            query_page_size: DEFAULT_QUERY_PAGE_SIZE,
        }
    }
}

/// DynamoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamoConfig {
    /// Name of the shared table.
    pub table_name: String,
    /// Custom endpoint URL (for LocalStack or DynamoDB Local).
    pub endpoint_url: Option<String>,
    /// AWS region. Uses the default provider chain if not set.
    pub region: Option<String>,
}

impl Default for DynamoConfig {
    fn default() -> Self {
        Self {
            table_name: "dashboard-mgt".to_string(),
            endpoint_url: None,
            region: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_config_default() {
        let storage = StorageConfig::default();
        assert_eq!(storage.storage_type, StorageType::Memory);
        assert_eq!(storage.dynamo.table_name, "dashboard-mgt");
        assert_eq!(storage.query_page_size, DEFAULT_QUERY_PAGE_SIZE);
    }
}
