//! External collaborators of the pipeline
//!
//! SQL generation, regeneration and execution live outside this crate; the
//! controller only sees them through these traits. Each call is one unit of
//! work with no partial results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error returned by an external collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Produces SQL for a natural-language question
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generate SQL from the question and the schema context text
    async fn generate(&self, question: &str, schema_text: &str) -> Result<String, BoxError>;
}

/// Produces corrected SQL from a rejected statement and its violations
#[async_trait]
pub trait SqlRegenerator: Send + Sync {
    /// Regenerate SQL given the previous statement and its joined errors
    async fn regenerate(
        &self,
        question: &str,
        bad_sql: &str,
        errors_text: &str,
        schema_text: &str,
    ) -> Result<String, BoxError>;
}

/// Runs validated SQL against the database
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, BoxError>;
}

/// Rows returned by a [`QueryExecutor`]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueryResult {
    /// One column-to-value map per row, in result order
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,

    /// Number of rows returned
    pub row_count: usize,

    /// Wall-clock execution time
    pub execution_time_seconds: f64,
}

impl QueryResult {
    /// Build a result, deriving `row_count` from `rows`
    pub fn new(
        rows: Vec<serde_json::Map<String, serde_json::Value>>,
        execution_time_seconds: f64,
    ) -> Self {
        Self {
            row_count: rows.len(),
            rows,
            execution_time_seconds,
        }
    }
}
