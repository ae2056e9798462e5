pub mod disk;
pub mod memory;

use anyhow::{Context, Result};
use disk::{DiskHistory, DiskSnapshotStore};
use fjall::{Keyspace, PartitionCreateOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub use memory::{MemoryHistory, MemorySnapshotStore};

const RATES_PARTITION: &str = "rates";
const HISTORY_PARTITION: &str = "history";

/// On-disk keyspace holding the rate snapshot and conversion history
/// partitions.
pub struct DataStore {
    keyspace: Arc<Keyspace>,
}

impl DataStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        let cache_dir = data_path.join("cache");
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create directory: {}", cache_dir.display()))?;
        let keyspace = fjall::Config::new(&cache_dir)
            .open()
            .with_context(|| format!("Failed to open data store at {}", cache_dir.display()))?;
        debug!("Opened data store at {}", cache_dir.display());
        Ok(Self {
            keyspace: Arc::new(keyspace),
        })
    }

    pub fn snapshot_store(&self) -> Result<DiskSnapshotStore> {
        let partition = self
            .keyspace
            .open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        Ok(DiskSnapshotStore::new(Arc::clone(&self.keyspace), partition))
    }

    pub fn history(&self, limit: usize) -> Result<DiskHistory> {
        let partition = self
            .keyspace
            .open_partition(HISTORY_PARTITION, PartitionCreateOptions::default())?;
        Ok(DiskHistory::new(
            Arc::clone(&self.keyspace),
            partition,
            limit,
        ))
    }
}
