//! Conversion history abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub category: String,
    pub from_unit: String,
    pub to_unit: String,
    pub input: f64,
    pub output: f64,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(category: &str, from_unit: &str, to_unit: &str, input: f64, output: f64) -> Self {
        Self {
            category: category.to_string(),
            from_unit: from_unit.to_string(),
            to_unit: to_unit.to_string(),
            input,
            output,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;
    /// Most recent entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
    async fn clear(&self) -> Result<()>;
}
