//! Schema snapshot cache with single-flight loading
//!
//! The current snapshot sits behind an `RwLock<Option<Arc<_>>>` and is
//! swapped as a whole, so readers see either the old or the new snapshot and
//! never a partial one. Loads are serialized on an async mutex: concurrent
//! callers wait for the load in flight and reuse its result.

use crate::error::SchemaError;
use crate::persist::SnapshotFile;
use querygate_catalog::SchemaStore;
use querygate_core::SchemaSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Where a loaded snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Already cached in memory
    Memory,

    /// Read from the persisted snapshot file
    Disk,

    /// Queried from the backing store
    Store,
}

/// Cache of the current schema snapshot
///
/// Construct one per process and share it by reference (or `Arc`) with the
/// guardrail and the regeneration controller.
///
/// ## Usage
///
/// ```rust,ignore
/// let cache = SchemaCache::new(Arc::new(store))
///     .with_persistence(SnapshotFile::new(".querygate/schema_snapshot.json"));
///
/// let snapshot = cache.get().await?;
/// let columns = cache.columns("sales.orders").await?;
/// ```
pub struct SchemaCache {
    /// Backing schema store
    store: Arc<dyn SchemaStore>,

    /// Current snapshot
    current: RwLock<Option<Arc<SchemaSnapshot>>>,

    /// Serializes loads and snapshot file access
    ///
    /// Shared so a snapshot write can hold it past a dropped load.
    load_lock: Arc<Mutex<()>>,

    /// Bumped on every installed snapshot
    generation: AtomicU64,

    /// Optional persisted snapshot
    file: Option<SnapshotFile>,
}

impl SchemaCache {
    /// Create a cache over a backing store, without persistence
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
            load_lock: Arc::new(Mutex::new(())),
            generation: AtomicU64::new(0),
            file: None,
        }
    }

    /// Persist snapshots to (and warm-start from) this file
    pub fn with_persistence(mut self, file: SnapshotFile) -> Self {
        self.file = Some(file);
        self
    }

    /// The persisted snapshot file, if configured
    pub fn snapshot_file(&self) -> Option<&SnapshotFile> {
        self.file.as_ref()
    }

    /// The cached snapshot, without loading
    pub fn current(&self) -> Option<Arc<SchemaSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of snapshots installed so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Return the cached snapshot, loading it on first use
    pub async fn get(&self) -> Result<Arc<SchemaSnapshot>, SchemaError> {
        if let Some(snapshot) = self.current() {
            return Ok(snapshot);
        }
        self.load(false).await
    }

    /// Load the snapshot
    ///
    /// Without `force_reload`, an in-memory snapshot is returned as is, then
    /// the persisted file is tried, then the backing store. With
    /// `force_reload`, the backing store is always queried, unless another
    /// reload finished while this call was waiting for the load lock.
    pub async fn load(&self, force_reload: bool) -> Result<Arc<SchemaSnapshot>, SchemaError> {
        self.load_with_source(force_reload)
            .await
            .map(|(snapshot, _)| snapshot)
    }

    /// Force a live reload from the backing store
    pub async fn reload(&self) -> Result<Arc<SchemaSnapshot>, SchemaError> {
        self.load(true).await
    }

    /// Like [`load`](Self::load), also reporting where the snapshot came from
    pub async fn load_with_source(
        &self,
        force_reload: bool,
    ) -> Result<(Arc<SchemaSnapshot>, LoadSource), SchemaError> {
        let observed = self.generation();
        let guard = Arc::clone(&self.load_lock).lock_owned().await;

        if let Some(snapshot) = self.current() {
            let reloaded_meanwhile = self.generation() != observed;
            if !force_reload || reloaded_meanwhile {
                debug!(tables = snapshot.table_count(), "schema served from memory");
                return Ok((snapshot, LoadSource::Memory));
            }
        }

        if !force_reload {
            if let Some(snapshot) = self.read_persisted().await {
                info!(tables = snapshot.table_count(), "schema loaded from snapshot file");
                return Ok((self.install(snapshot), LoadSource::Disk));
            }
        }

        let snapshot = self.fetch_live().await?;
        let snapshot = self.install(snapshot);
        info!(
            store = self.store.name(),
            tables = snapshot.table_count(),
            "schema loaded from backing store"
        );

        if let Some(file) = &self.file {
            if let Err(e) = file.write_holding(&snapshot, guard).await {
                warn!(error = %e, "schema snapshot not persisted");
            }
        }

        Ok((snapshot, LoadSource::Store))
    }

    /// Column names for a table; empty for unknown tables
    pub async fn columns(&self, table: &str) -> Result<Vec<String>, SchemaError> {
        Ok(self.get().await?.columns(table))
    }

    /// Description for a table, or the "no description" sentinel
    pub async fn description(&self, table: &str) -> Result<String, SchemaError> {
        Ok(self.get().await?.description(table))
    }

    /// Schema context text for SQL generation
    pub async fn prompt_text(&self) -> Result<String, SchemaError> {
        Ok(self.get().await?.to_prompt_text())
    }

    async fn read_persisted(&self) -> Option<SchemaSnapshot> {
        let file = self.file.as_ref()?;

        match file.read().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "ignoring schema snapshot file, reloading from store");
                None
            }
        }
    }

    async fn fetch_live(&self) -> Result<SchemaSnapshot, SchemaError> {
        let store = self.store.name();

        let rows = self
            .store
            .fetch_rows()
            .await
            .map_err(|source| SchemaError::StoreUnavailable { store, source })?;

        let snapshot = SchemaSnapshot::from_rows(rows);
        if snapshot.is_empty() {
            return Err(SchemaError::EmptySchema { store });
        }

        Ok(snapshot)
    }

    fn install(&self, snapshot: SchemaSnapshot) -> Arc<SchemaSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        self.generation.fetch_add(1, Ordering::SeqCst);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use querygate_catalog::MockStoreBuilder;

    #[tokio::test]
    async fn current_is_empty_before_first_load() {
        let store = MockStoreBuilder::new()
            .with_table("", "orders", &["id"], None)
            .build();
        let cache = SchemaCache::new(Arc::new(store.clone()));

        assert!(cache.current().is_none());
        assert_eq!(cache.generation(), 0);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn load_reports_source() {
        let store = MockStoreBuilder::new()
            .with_table("", "orders", &["id"], None)
            .build();
        let cache = SchemaCache::new(Arc::new(store));

        let (_, first) = cache.load_with_source(false).await.unwrap();
        let (_, second) = cache.load_with_source(false).await.unwrap();
        let (_, forced) = cache.load_with_source(true).await.unwrap();

        assert_eq!(first, LoadSource::Store);
        assert_eq!(second, LoadSource::Memory);
        assert_eq!(forced, LoadSource::Store);
        assert_eq!(cache.generation(), 2);
    }
}
