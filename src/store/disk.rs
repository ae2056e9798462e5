use crate::core::cache::SnapshotStore;
use crate::core::history::{HistoryEntry, HistorySink};
use crate::core::rates::RateSnapshot;
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionHandle, PersistMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Snapshot store backed by a fjall partition; values are JSON.
pub struct DiskSnapshotStore {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

impl DiskSnapshotStore {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle) -> Self {
        Self {
            keyspace,
            partition,
        }
    }
}

#[async_trait]
impl SnapshotStore for DiskSnapshotStore {
    async fn read(&self, key: &str) -> Result<Option<RateSnapshot>> {
        let Some(value) = self
            .partition
            .get(key)
            .with_context(|| format!("Failed to read snapshot {key}"))?
        else {
            debug!("Store MISS for key: {}", key);
            return Ok(None);
        };
        let snapshot: RateSnapshot = serde_json::from_slice(&value)
            .with_context(|| format!("Failed to parse stored snapshot {key}"))?;
        debug!("Store HIT for key: {}", key);
        Ok(Some(snapshot))
    }

    async fn write(&self, key: &str, snapshot: &RateSnapshot) -> Result<()> {
        let value = serde_json::to_vec(snapshot)?;
        self.partition
            .insert(key, value)
            .with_context(|| format!("Failed to write snapshot {key}"))?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("Store PUT for key: {}", key);
        Ok(())
    }
}

/// History kept in a fjall partition, keyed so that lexical order is
/// insertion order.
pub struct DiskHistory {
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
    limit: usize,
    seq: AtomicU64,
}

impl DiskHistory {
    pub fn new(keyspace: Arc<Keyspace>, partition: PartitionHandle, limit: usize) -> Self {
        Self {
            keyspace,
            partition,
            limit,
            seq: AtomicU64::new(0),
        }
    }

    fn entry_key(&self, entry: &HistoryEntry) -> String {
        let nanos = entry.timestamp.timestamp_nanos_opt().unwrap_or_default();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:020}-{seq:06}")
    }

    fn prune(&self) -> Result<()> {
        let len = self.partition.len()?;
        if len <= self.limit {
            return Ok(());
        }
        let excess: Vec<_> = self
            .partition
            .keys()
            .take(len - self.limit)
            .collect::<Result<_, _>>()?;
        for key in excess {
            self.partition.remove(key)?;
        }
        Ok(())
    }
}

#[async_trait]
impl HistorySink for DiskHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let key = self.entry_key(&entry);
        self.partition
            .insert(key.as_str(), serde_json::to_vec(&entry)?)
            .context("Failed to write history entry")?;
        self.prune()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("History PUT for key: {}", key);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        for item in self.partition.iter().rev().take(limit) {
            let (_, value) = item?;
            match serde_json::from_slice::<HistoryEntry>(&value) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!("Skipping unreadable history entry: {}", e),
            }
        }
        Ok(entries)
    }

    async fn clear(&self) -> Result<()> {
        let keys: Vec<_> = self.partition.keys().collect::<Result<_, _>>()?;
        for key in keys {
            self.partition.remove(key)?;
        }
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!("History CLEAR");
        Ok(())
    }
}
