//! Schema store trait

use querygate_core::SchemaRow;

/// Errors that can occur when reading schema metadata
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Trait for stores that can list table/column metadata
#[async_trait::async_trait]
pub trait SchemaStore: Send + Sync {
    /// Get the store name (e.g., "PostgreSQL")
    fn name(&self) -> &'static str;

    /// Fetch every column row, ordered by schema, table and ordinal position
    ///
    /// An empty result is not an error here; the cache decides what an
    /// empty schema means.
    async fn fetch_rows(&self) -> Result<Vec<SchemaRow>, StoreError>;

    /// Test the connection to the store
    async fn test_connection(&self) -> Result<(), StoreError>;
}
