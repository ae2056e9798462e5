//! Single entry point for conversions across static and currency categories.

use crate::core::engine;
use crate::core::error::ConvertError;
use crate::core::history::{HistoryEntry, HistorySink};
use crate::core::rates::{CURRENCY_CATEGORY, RateSnapshot};
use crate::core::units::{Category, UnitInfo, UnitRegistry};
use crate::providers::caching::CachingRateProvider;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub struct Converter {
    registry: UnitRegistry,
    rates: CachingRateProvider,
    currency_precision: u32,
    history: Option<Arc<dyn HistorySink>>,
    pending: Mutex<JoinSet<()>>,
}

fn is_currency(category: &str) -> bool {
    category.eq_ignore_ascii_case(CURRENCY_CATEGORY)
}

impl Converter {
    pub fn new(registry: UnitRegistry, rates: CachingRateProvider, currency_precision: u32) -> Self {
        Self {
            registry,
            rates,
            currency_precision,
            history: None,
            pending: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn rates(&self) -> &CachingRateProvider {
        &self.rates
    }

    pub fn categories(&self) -> Vec<&str> {
        self.registry
            .categories()
            .chain(std::iter::once(CURRENCY_CATEGORY))
            .collect()
    }

    pub fn precision(&self, category: &str) -> Result<u32, ConvertError> {
        if is_currency(category) {
            return Ok(self.currency_precision);
        }
        Ok(self.registry.category(category)?.precision)
    }

    /// Parses `raw` and converts it.
    pub async fn convert_str(
        &self,
        category: &str,
        from: &str,
        to: &str,
        raw: &str,
    ) -> Result<f64, ConvertError> {
        let value = engine::parse_value(raw)?;
        self.convert(category, from, to, value).await
    }

    /// Static categories never await; currency resolves a snapshot first.
    pub async fn convert(
        &self,
        category: &str,
        from: &str,
        to: &str,
        value: f64,
    ) -> Result<f64, ConvertError> {
        if is_currency(category) {
            let snapshot = self.rates.get_rates().await?;
            let currency = snapshot.category(self.currency_precision, &[from, to])?;
            self.convert_in(&currency, from, to, value)
        } else {
            self.convert_in(self.registry.category(category)?, from, to, value)
        }
    }

    /// History records the canonical keys, not the caller's spelling.
    fn convert_in(
        &self,
        category: &Category,
        from: &str,
        to: &str,
        value: f64,
    ) -> Result<f64, ConvertError> {
        let result = engine::convert(category, from, to, value)?;
        let from = category.unit(from)?.key.as_str();
        let to = category.unit(to)?.key.as_str();
        debug!(category = %category.key, from, to, value, result, "Converted");

        self.record_history(HistoryEntry::new(&category.key, from, to, value, result));
        Ok(result)
    }

    pub async fn list_units(&self, category: &str) -> Result<Vec<UnitInfo>, ConvertError> {
        if !is_currency(category) {
            return Ok(self.registry.category(category)?.unit_infos());
        }
        let snapshot = match self.rates.revalidate() {
            Some(snapshot) => snapshot,
            None => self.rates.get_rates().await?,
        };
        Ok(snapshot.unit_infos())
    }

    /// Peek at the resident snapshot without triggering a fetch.
    pub fn cached_snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.rates.cached_snapshot()
    }

    /// Waits for history writes spawned so far. Conversions never wait on
    /// these; short-lived callers use this before exiting.
    pub async fn flush_history(&self) {
        let mut pending =
            std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        while pending.join_next().await.is_some() {}
    }

    fn record_history(&self, entry: HistoryEntry) {
        let Some(history) = self.history.clone() else {
            return;
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!("No async runtime, dropping history entry");
                return;
            }
        };
        let task = async move {
            if let Err(e) = history.record(entry).await {
                warn!(error = %e, "Failed to record conversion history");
            }
        };
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // Reap finished writes so the set stays small
        while pending.try_join_next().is_some() {}
        pending.spawn_on(task, &handle);
    }
}
