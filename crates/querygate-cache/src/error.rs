//! Schema cache errors

use querygate_catalog::StoreError;
use std::path::PathBuf;

/// Errors raised while loading or persisting schema snapshots
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The backing store could not be queried
    #[error("Schema load failed: {store} unavailable: {source}")]
    StoreUnavailable {
        store: &'static str,
        #[source]
        source: StoreError,
    },

    /// The backing store answered with zero tables
    #[error("Schema load failed: {store} returned no tables")]
    EmptySchema { store: &'static str },

    /// The persisted snapshot could not be read back
    #[error("Schema cache file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// Writing the persisted snapshot failed
    #[error("Failed to persist schema snapshot to {path}: {reason}")]
    Persist { path: PathBuf, reason: String },
}

impl SchemaError {
    /// Whether this is a load failure (store unreachable or empty)
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. } | Self::EmptySchema { .. })
    }
}
