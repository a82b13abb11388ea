//! Schema snapshot cache
//!
//! Loads table/column/description metadata from a [`SchemaStore`], memoizes
//! it as an immutable [`SchemaSnapshot`], and persists it to a local file so
//! later process starts can serve from disk before touching the store.
//!
//! [`SchemaStore`]: querygate_catalog::SchemaStore
//! [`SchemaSnapshot`]: querygate_core::SchemaSnapshot

pub mod cache;
pub mod error;
pub mod persist;

pub use cache::{SchemaCache, LoadSource};
pub use error::SchemaError;
pub use persist::SnapshotFile;
