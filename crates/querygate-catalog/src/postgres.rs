//! PostgreSQL schema store using information_schema
//!
//! Lists every column of every table in the configured schemas, joined with
//! the table comment from `pg_description`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! // Plain connection
//! let store = PostgresStore::from_connection_string(
//!     "host=localhost port=5432 dbname=shop user=reader password=secret"
//! ).await?;
//!
//! // TLS connection, restricted to two schemas
//! let store = PostgresStore::from_connection_string_with_tls(
//!     "host=db.example.com dbname=shop user=reader password=secret"
//! ).await?
//! .with_schemas(vec!["sales".to_string(), "crm".to_string()]);
//! ```
//!
//! Reference: https://www.postgresql.org/docs/current/information-schema-columns.html

use crate::store::{SchemaStore, StoreError};
use querygate_core::SchemaRow;

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls, Config as PgConfig};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

#[cfg(feature = "postgres")]
const COLUMNS_QUERY: &str = r#"
    SELECT
        c.table_schema::text,
        c.table_name::text,
        c.column_name::text,
        obj_description(pc.oid, 'pg_class') AS description
    FROM information_schema.columns c
    JOIN pg_catalog.pg_namespace pn ON pn.nspname = c.table_schema
    JOIN pg_catalog.pg_class pc ON pc.relname = c.table_name AND pc.relnamespace = pn.oid
    WHERE c.table_schema::text = ANY($1::text[])
    ORDER BY c.table_schema, c.table_name, c.ordinal_position
"#;

/// PostgreSQL schema store
pub struct PostgresStore {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    /// Connection host, for logging
    host: String,

    /// Database name
    database: String,

    /// Schemas to list
    schemas: Vec<String>,
}

impl PostgresStore {
    /// Create a store from a PostgreSQL connection string
    ///
    /// Supports the key/value format:
    /// `host=localhost port=5432 dbname=mydb user=postgres password=secret`
    #[cfg(feature = "postgres")]
    pub async fn from_connection_string(conn_str: &str) -> Result<Self, StoreError> {
        let (host, database) = describe_connection(conn_str)?;

        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| StoreError::AuthenticationError(format!(
                "Failed to connect to PostgreSQL at {}: {}", host, e
            )))?;

        let host_clone = host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(host = %host_clone, error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Self::with_client(client, host, database))
    }

    /// Create store without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn from_connection_string(_conn_str: &str) -> Result<Self, StoreError> {
        Err(disabled())
    }

    /// Create a store over a TLS connection
    #[cfg(feature = "postgres")]
    pub async fn from_connection_string_with_tls(conn_str: &str) -> Result<Self, StoreError> {
        let (host, database) = describe_connection(conn_str)?;

        let connector = TlsConnector::builder()
            .build()
            .map_err(|e| StoreError::ConfigError(format!(
                "Failed to create TLS connector: {}", e
            )))?;

        let tls = MakeTlsConnector::new(connector);

        let (client, connection) = tokio_postgres::connect(conn_str, tls)
            .await
            .map_err(|e| StoreError::AuthenticationError(format!(
                "Failed to connect to PostgreSQL at {} with TLS: {}", host, e
            )))?;

        let host_clone = host.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(host = %host_clone, error = %e, "PostgreSQL TLS connection error");
            }
        });

        Ok(Self::with_client(client, host, database))
    }

    /// Create store without postgres feature (returns error)
    #[cfg(not(feature = "postgres"))]
    pub async fn from_connection_string_with_tls(_conn_str: &str) -> Result<Self, StoreError> {
        Err(disabled())
    }

    #[cfg(feature = "postgres")]
    fn with_client(client: Client, host: String, database: String) -> Self {
        Self {
            client,
            host,
            database,
            schemas: vec!["public".to_string()],
        }
    }

    /// Restrict listing to these schemas (default: `public`)
    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        if !schemas.is_empty() {
            self.schemas = schemas;
        }
        self
    }

    /// Get the connection host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the database name
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Schemas being listed
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }
}

#[cfg(feature = "postgres")]
fn describe_connection(conn_str: &str) -> Result<(String, String), StoreError> {
    let config: PgConfig = conn_str.parse()
        .map_err(|e| StoreError::ConfigError(format!(
            "Invalid connection string: {}", e
        )))?;

    let host = config.get_hosts()
        .first()
        .map(|h| format!("{:?}", h))
        .unwrap_or_else(|| "localhost".to_string());
    let database = config.get_dbname()
        .unwrap_or("postgres")
        .to_string();

    Ok((host, database))
}

#[cfg(not(feature = "postgres"))]
fn disabled() -> StoreError {
    StoreError::ConfigError(
        "PostgreSQL support not compiled. Rebuild with: cargo build --features postgres".to_string()
    )
}

/// Map a driver error onto the store taxonomy
pub fn classify_error(message: &str) -> StoreError {
    let lower = message.to_lowercase();
    if lower.contains("permission denied") {
        StoreError::PermissionDenied(message.to_string())
    } else if lower.contains("password authentication failed") {
        StoreError::AuthenticationError(message.to_string())
    } else if lower.contains("connection") && (lower.contains("closed") || lower.contains("refused")) {
        StoreError::NetworkError(message.to_string())
    } else {
        StoreError::QueryError(message.to_string())
    }
}

#[async_trait::async_trait]
impl SchemaStore for PostgresStore {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    #[cfg(feature = "postgres")]
    async fn fetch_rows(&self) -> Result<Vec<SchemaRow>, StoreError> {
        let rows = self.client
            .query(COLUMNS_QUERY, &[&self.schemas])
            .await
            .map_err(|e| classify_error(&e.to_string()))?;

        tracing::debug!(
            database = %self.database,
            rows = rows.len(),
            "fetched schema rows"
        );

        Ok(rows
            .into_iter()
            .map(|row| SchemaRow {
                schema_name: row.get(0),
                table_name: row.get(1),
                column_name: row.get(2),
                description: row.get(3),
            })
            .collect())
    }

    #[cfg(not(feature = "postgres"))]
    async fn fetch_rows(&self) -> Result<Vec<SchemaRow>, StoreError> {
        Err(disabled())
    }

    #[cfg(feature = "postgres")]
    async fn test_connection(&self) -> Result<(), StoreError> {
        self.client
            .query("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    #[cfg(not(feature = "postgres"))]
    async fn test_connection(&self) -> Result<(), StoreError> {
        Err(disabled())
    }
}
