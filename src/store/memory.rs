use crate::core::cache::SnapshotStore;
use crate::core::history::{HistoryEntry, HistorySink};
use crate::core::rates::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory snapshot store, mostly for tests and as a stand-in when the
/// disk store cannot be opened.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<Mutex<HashMap<String, RateSnapshot>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn read(&self, key: &str) -> Result<Option<RateSnapshot>> {
        let store = self.inner.lock().await;
        let value = store.get(key).cloned();
        if value.is_some() {
            debug!("Store HIT for key: {}", key);
        } else {
            debug!("Store MISS for key: {}", key);
        }
        Ok(value)
    }

    async fn write(&self, key: &str, snapshot: &RateSnapshot) -> Result<()> {
        let mut store = self.inner.lock().await;
        debug!("Store PUT for key: {}", key);
        store.insert(key.to_string(), snapshot.clone());
        Ok(())
    }
}

/// Bounded history, newest first. Oldest entries drop off past `limit`.
#[derive(Clone)]
pub struct MemoryHistory {
    entries: Arc<Mutex<VecDeque<HistoryEntry>>>,
    limit: usize,
}

impl MemoryHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            limit,
        }
    }
}

#[async_trait]
impl HistorySink for MemoryHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push_front(entry);
        entries.truncate(self.limit);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().take(limit).cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.lock().await.clear();
        debug!("History CLEAR");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_snapshot_read_write() {
        let store = MemorySnapshotStore::new();

        // Initially, store is empty
        assert!(store.read("rates").await.unwrap().is_none());

        let snapshot = RateSnapshot::new(
            "USD",
            [("USD".to_string(), 1.0)].into_iter().collect(),
            Utc::now(),
        );
        store.write("rates", &snapshot).await.unwrap();
        assert_eq!(store.read("rates").await.unwrap(), Some(snapshot));

        // Other keys are unaffected
        assert!(store.read("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_is_bounded_and_newest_first() {
        let history = MemoryHistory::new(3);
        for i in 0..5 {
            history
                .record(HistoryEntry::new("Length", "Meter", "Foot", i as f64, 0.0))
                .await
                .unwrap();
        }

        let recent = history.recent(10).await.unwrap();
        let inputs: Vec<f64> = recent.iter().map(|e| e.input).collect();
        assert_eq!(inputs, vec![4.0, 3.0, 2.0]);
        assert_eq!(history.recent(1).await.unwrap().len(), 1);

        history.clear().await.unwrap();
        assert!(history.recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_limit_does_not_allocate_up_front() {
        let history = MemoryHistory::new(usize::MAX);
        history
            .record(HistoryEntry::new("Time", "Hour", "Minute", 1.0, 60.0))
            .await
            .unwrap();
        assert_eq!(history.recent(usize::MAX).await.unwrap().len(), 1);
    }
}
