//! Backing schema stores for the snapshot cache
//!
//! A store returns flat `(schema, table, column, description)` rows ordered
//! by schema, table and ordinal position.
//!
//! ## Features
//!
//! - `postgres` - PostgreSQL support via `information_schema` and `pg_description`
//!
//! ## Example
//!
//! ```rust,ignore
//! use querygate_catalog::{PostgresStore, SchemaStore};
//!
//! let store = PostgresStore::from_connection_string("host=localhost dbname=shop").await?
//!     .with_schemas(vec!["sales".to_string()]);
//! let rows = store.fetch_rows().await?;
//! ```

pub mod store;
pub mod mock;
pub mod postgres;

pub use store::{SchemaStore, StoreError};
pub use mock::{MockStore, MockStoreBuilder};
pub use postgres::PostgresStore;
