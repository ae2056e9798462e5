//! Persistent snapshot store abstraction

use crate::core::rates::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;

/// Key/value store for rate snapshots. Reads and writes may fail
/// independently of the network; callers treat both as best-effort.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<RateSnapshot>>;
    async fn write(&self, key: &str, snapshot: &RateSnapshot) -> Result<()>;
}
