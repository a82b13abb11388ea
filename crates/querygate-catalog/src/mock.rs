//! Mock schema store for testing
//!
//! Serves predefined rows without connecting to a database. It can simulate
//! outages, empty stores and latency, and counts how often it was queried so
//! tests can assert cache hits.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use querygate_catalog::{MockStoreBuilder, SchemaStore};
//!
//! let store = MockStoreBuilder::new()
//!     .with_table("sales", "orders", &["order_id", "total"], Some("Orders placed"))
//!     .with_latency(20)
//!     .build();
//!
//! let rows = store.fetch_rows().await?;
//! assert_eq!(store.query_count(), 1);
//! ```

use crate::store::{SchemaStore, StoreError};
use querygate_core::SchemaRow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory schema store
///
/// Clones share rows, failure state and the query counter.
#[derive(Clone)]
pub struct MockStore {
    /// Rows returned by `fetch_rows`
    rows: Arc<RwLock<Vec<SchemaRow>>>,

    /// Error returned by `fetch_rows` instead of rows
    failure: Arc<RwLock<Option<StoreError>>>,

    /// Number of `fetch_rows` calls
    queries: Arc<AtomicUsize>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,
}

impl MockStore {
    /// Create a store with no rows
    pub fn new() -> Self {
        Self::from_rows(Vec::new())
    }

    /// Create a store serving the given rows
    pub fn from_rows(rows: Vec<SchemaRow>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows)),
            failure: Arc::new(RwLock::new(None)),
            queries: Arc::new(AtomicUsize::new(0)),
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Replace the rows served by subsequent queries
    pub async fn set_rows(&self, rows: Vec<SchemaRow>) {
        *self.rows.write().await = rows;
    }

    /// Make subsequent queries fail with `error`
    pub async fn fail_with(&self, error: StoreError) {
        *self.failure.write().await = Some(error);
    }

    /// Stop failing queries
    pub async fn clear_failure(&self) {
        *self.failure.write().await = None;
    }

    /// Configure to fail all connection tests
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure simulated latency for all operations
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Number of times `fetch_rows` has been called
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SchemaStore for MockStore {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn fetch_rows(&self) -> Result<Vec<SchemaRow>, StoreError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.failure.read().await.as_ref() {
            return Err(error.clone());
        }

        Ok(self.rows.read().await.clone())
    }

    async fn test_connection(&self) -> Result<(), StoreError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(StoreError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Builder for a [`MockStore`] with several tables
pub struct MockStoreBuilder {
    rows: Vec<SchemaRow>,
    failure: Option<StoreError>,
    fail_connection: bool,
    latency_ms: u64,
}

impl MockStoreBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            failure: None,
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Add a table with its columns in ordinal order
    pub fn with_table(
        mut self,
        schema_name: &str,
        table: &str,
        columns: &[&str],
        description: Option<&str>,
    ) -> Self {
        self.rows.extend(columns.iter().map(|column| {
            SchemaRow::new(schema_name, table, *column, description.map(str::to_string))
        }));
        self
    }

    /// Fail every query with `error`
    pub fn with_failure(mut self, error: StoreError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Configure connection failure
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Build the MockStore
    pub fn build(self) -> MockStore {
        MockStore {
            rows: Arc::new(RwLock::new(self.rows)),
            failure: Arc::new(RwLock::new(self.failure)),
            queries: Arc::new(AtomicUsize::new(0)),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
        }
    }
}

impl Default for MockStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
