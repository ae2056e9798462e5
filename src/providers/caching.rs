use crate::core::cache::SnapshotStore;
use crate::core::config::CurrencyConfig;
use crate::core::error::ConvertError;
use crate::core::rates::{RateSnapshot, RateSource};
use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<RateSnapshot>, ConvertError>>>;

#[derive(Debug, Clone)]
pub struct RateProviderOptions {
    pub reference: String,
    pub freshness: Duration,
    pub store_key: String,
    /// A fetch running longer than this counts as failed.
    pub fetch_timeout: std::time::Duration,
    /// Used when neither a live fetch nor the store yields a snapshot.
    pub fallback: Option<RateSnapshot>,
}

impl Default for RateProviderOptions {
    fn default() -> Self {
        Self {
            reference: "USD".to_string(),
            freshness: Duration::hours(24),
            store_key: "currency-rates".to_string(),
            fetch_timeout: std::time::Duration::from_secs(30),
            fallback: Some(RateSnapshot::fallback()),
        }
    }
}

impl RateProviderOptions {
    pub fn from_config(config: &CurrencyConfig) -> Result<Self> {
        // Three attempts, each bounded by the HTTP timeout, plus retry pauses
        let attempt_secs = config.provider.timeout_secs.saturating_add(1);
        Ok(Self {
            reference: config.reference.to_ascii_uppercase(),
            freshness: config.freshness_window()?,
            fetch_timeout: std::time::Duration::from_secs(attempt_secs.saturating_mul(3)),
            ..Self::default()
        })
    }
}

/// Owns the single in-memory rate snapshot. Resolution order on a miss is
/// live fetch, then persisted snapshot, then the fallback table. Concurrent
/// refreshes share one fetch.
#[derive(Clone)]
pub struct CachingRateProvider {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn RateSource>,
    store: Arc<dyn SnapshotStore>,
    options: RateProviderOptions,
    slot: RwLock<Option<Arc<RateSnapshot>>>,
    in_flight: Mutex<Option<SharedFetch>>,
}

impl CachingRateProvider {
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn SnapshotStore>,
        options: RateProviderOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                store,
                options,
                slot: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Loads the persisted snapshot into memory if nothing is cached yet.
    /// Never touches the network.
    pub async fn initialize(&self) {
        if self.cached_snapshot().is_some() {
            return;
        }
        match self.inner.store.read(&self.inner.options.store_key).await {
            Ok(Some(snapshot)) => {
                debug!(timestamp = %snapshot.timestamp, "Loaded persisted rate snapshot");
                self.inner.adopt(Arc::new(snapshot));
            }
            Ok(None) => debug!("No persisted rate snapshot"),
            Err(e) => warn!(error = %e, "Failed to read persisted rate snapshot"),
        }
    }

    pub fn cached_snapshot(&self) -> Option<Arc<RateSnapshot>> {
        self.inner.current()
    }

    pub fn is_stale(&self, snapshot: &RateSnapshot) -> bool {
        snapshot.is_stale_at(self.inner.options.freshness, Utc::now())
    }

    /// Returns a fresh cached snapshot without I/O, otherwise refreshes.
    pub async fn get_rates(&self) -> Result<Arc<RateSnapshot>, ConvertError> {
        if let Some(snapshot) = self.cached_snapshot() {
            if !self.is_stale(&snapshot) {
                debug!("Rate cache HIT");
                return Ok(snapshot);
            }
            debug!("Rate cache STALE");
        } else {
            debug!("Rate cache MISS");
        }
        self.refresh().await
    }

    /// Starts a fetch, or joins the one already in flight.
    pub async fn refresh(&self) -> Result<Arc<RateSnapshot>, ConvertError> {
        let fetch = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match in_flight.as_ref() {
                Some(fetch) => {
                    debug!("Joining in-flight rate fetch");
                    fetch.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fetch = async move {
                        let result = inner.acquire().await;
                        inner
                            .in_flight
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .take();
                        result
                    }
                    .boxed()
                    .shared();
                    *in_flight = Some(fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    /// Returns the cached snapshot immediately. A stale one triggers a
    /// background refresh that nobody waits on.
    pub fn revalidate(&self) -> Option<Arc<RateSnapshot>> {
        let snapshot = self.cached_snapshot()?;
        if self.is_stale(&snapshot) {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let provider = self.clone();
                    handle.spawn(async move {
                        if let Err(e) = provider.refresh().await {
                            warn!(error = %e, "Background rate refresh failed");
                        }
                    });
                }
                Err(_) => debug!("No async runtime, skipping background rate refresh"),
            }
        }
        Some(snapshot)
    }
}

impl Inner {
    fn current(&self) -> Option<Arc<RateSnapshot>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn adopt(&self, snapshot: Arc<RateSnapshot>) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    async fn acquire(&self) -> Result<Arc<RateSnapshot>, ConvertError> {
        let key = &self.options.store_key;
        let deadline = self.options.fetch_timeout;
        let fetch = self.source.fetch_rates(&self.options.reference);
        let fetched = tokio::time::timeout(deadline, fetch)
            .await
            .unwrap_or_else(|_| Err(anyhow!("Rate fetch timed out after {:?}", deadline)));
        let fetch_error = match fetched {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.adopt(Arc::clone(&snapshot));
                info!(
                    count = snapshot.rates.len(),
                    reference = %snapshot.reference,
                    "Fetched live currency rates"
                );
                if let Err(e) = self.store.write(key, &snapshot).await {
                    let err = ConvertError::StoreWriteFailed(e.to_string());
                    warn!(error = %err, "Continuing without persisted rates");
                }
                return Ok(snapshot);
            }
            Err(e) => e,
        };
        warn!(error = %fetch_error, "Live rate fetch failed");

        let stored = match self.store.read(key).await {
            Ok(stored) => stored.map(Arc::new),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted rate snapshot");
                None
            }
        };
        let resident = self.current().filter(|s| !s.is_fallback());
        let recovered = match (stored, resident) {
            (Some(stored), Some(resident)) if resident.timestamp > stored.timestamp => {
                Some(resident)
            }
            (Some(stored), _) => Some(stored),
            (None, resident) => resident,
        };
        if let Some(snapshot) = recovered {
            debug!(timestamp = %snapshot.timestamp, "Using last known rates");
            self.adopt(Arc::clone(&snapshot));
            return Ok(snapshot);
        }

        match &self.options.fallback {
            Some(fallback) => {
                warn!("Using built-in fallback currency rates");
                let snapshot = Arc::new(fallback.clone());
                self.adopt(Arc::clone(&snapshot));
                Ok(snapshot)
            }
            None => Err(ConvertError::RatesUnavailable(fetch_error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemorySnapshotStore;
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockSource {
        calls: AtomicUsize,
        rates: Option<Vec<(&'static str, f64)>>,
        delay: std::time::Duration,
    }

    impl MockSource {
        fn ok(rates: &[(&'static str, f64)]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                rates: Some(rates.to_vec()),
                delay: std::time::Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                rates: None,
                delay: std::time::Duration::ZERO,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RateSource for MockSource {
        async fn fetch_rates(&self, reference: &str) -> Result<RateSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.rates {
                Some(rates) => Ok(snapshot(reference, rates, Utc::now())),
                None => Err(anyhow!("network down")),
            }
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl SnapshotStore for BrokenStore {
        async fn read(&self, _key: &str) -> Result<Option<RateSnapshot>> {
            Err(anyhow!("disk unavailable"))
        }

        async fn write(&self, _key: &str, _snapshot: &RateSnapshot) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn snapshot(
        reference: &str,
        rates: &[(&str, f64)],
        timestamp: chrono::DateTime<Utc>,
    ) -> RateSnapshot {
        let rates: BTreeMap<String, f64> = rates.iter().map(|(c, r)| (c.to_string(), *r)).collect();
        RateSnapshot::new(reference, rates, timestamp)
    }

    fn provider(source: Arc<MockSource>, store: Arc<dyn SnapshotStore>) -> CachingRateProvider {
        CachingRateProvider::new(source, store, RateProviderOptions::default())
    }

    #[tokio::test]
    async fn test_fresh_snapshot_skips_fetch() {
        let store = MemorySnapshotStore::new();
        let fresh = snapshot("USD", &[("USD", 1.0), ("EUR", 0.9)], Utc::now());
        store.write("currency-rates", &fresh).await.unwrap();

        let source = Arc::new(MockSource::ok(&[("USD", 1.0), ("EUR", 0.5)]));
        let provider = provider(source.clone(), Arc::new(store));
        provider.initialize().await;

        let rates = provider.get_rates().await.unwrap();
        assert_eq!(rates.rate("EUR"), Some(0.9));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_snapshot_triggers_fetch_and_write_through() {
        let store = MemorySnapshotStore::new();
        let stale = snapshot(
            "USD",
            &[("USD", 1.0), ("EUR", 0.9)],
            Utc::now() - Duration::hours(25),
        );
        store.write("currency-rates", &stale).await.unwrap();

        let source = Arc::new(MockSource::ok(&[("USD", 1.0), ("EUR", 0.5)]));
        let provider = provider(source.clone(), Arc::new(store.clone()));
        provider.initialize().await;

        let rates = provider.get_rates().await.unwrap();
        assert_eq!(rates.rate("EUR"), Some(0.5));
        assert_eq!(source.calls(), 1);

        let persisted = store.read("currency-rates").await.unwrap().unwrap();
        assert_eq!(persisted.rate("EUR"), Some(0.5));

        // Now fresh: served from memory
        provider.get_rates().await.unwrap();
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_one_fetch() {
        let source = Arc::new(MockSource {
            delay: std::time::Duration::from_millis(50),
            ..MockSource::ok(&[("USD", 1.0), ("EUR", 0.92)])
        });
        let provider = provider(source.clone(), Arc::new(MemorySnapshotStore::new()));

        let (a, b, c) = tokio::join!(
            provider.get_rates(),
            provider.get_rates(),
            provider.get_rates()
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(source.calls(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn test_fetch_failure_with_empty_store_uses_fallback() {
        let source = Arc::new(MockSource::failing());
        let provider = provider(source.clone(), Arc::new(MemorySnapshotStore::new()));

        let rates = provider.get_rates().await.unwrap();
        assert!(rates.is_fallback());
        assert!(rates.codes().any(|c| c == "USD"));
        assert!(rates.codes().any(|c| c == "EUR"));
        assert!(rates.codes().any(|c| c == "GBP"));

        // Fallback counts as stale, so the next call retries
        provider.get_rates().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_adopts_persisted_snapshot() {
        let store = MemorySnapshotStore::new();
        let old = snapshot(
            "USD",
            &[("USD", 1.0), ("CHF", 0.88)],
            Utc::now() - Duration::days(3),
        );
        store.write("currency-rates", &old).await.unwrap();

        let provider = provider(Arc::new(MockSource::failing()), Arc::new(store));
        let rates = provider.get_rates().await.unwrap();
        assert_eq!(rates.rate("CHF"), Some(0.88));
        assert!(!rates.is_fallback());
        assert_eq!(provider.cached_snapshot().unwrap().rate("CHF"), Some(0.88));
    }

    #[tokio::test]
    async fn test_no_fallback_reports_rates_unavailable() {
        let provider = CachingRateProvider::new(
            Arc::new(MockSource::failing()),
            Arc::new(BrokenStore),
            RateProviderOptions {
                fallback: None,
                ..RateProviderOptions::default()
            },
        );
        let err = provider.get_rates().await.unwrap_err();
        assert_eq!(
            err,
            ConvertError::RatesUnavailable("network down".to_string())
        );
        assert!(provider.cached_snapshot().is_none());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let source = Arc::new(MockSource::ok(&[("USD", 1.0), ("EUR", 0.92)]));
        let provider = provider(source.clone(), Arc::new(BrokenStore));
        provider.initialize().await;
        assert!(provider.cached_snapshot().is_none());

        let rates = provider.get_rates().await.unwrap();
        assert_eq!(rates.rate("EUR"), Some(0.92));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_revalidate_refreshes_stale_snapshot_in_background() {
        let store = MemorySnapshotStore::new();
        let stale = snapshot(
            "USD",
            &[("USD", 1.0), ("EUR", 0.9)],
            Utc::now() - Duration::hours(30),
        );
        store.write("currency-rates", &stale).await.unwrap();

        let source = Arc::new(MockSource::ok(&[("USD", 1.0), ("EUR", 0.5)]));
        let provider = provider(source.clone(), Arc::new(store));
        provider.initialize().await;

        // Caller gets the stale snapshot right away
        let seen = provider.revalidate().unwrap();
        assert_eq!(seen.rate("EUR"), Some(0.9));

        for _ in 0..100 {
            if provider
                .cached_snapshot()
                .is_some_and(|s| s.rate("EUR") == Some(0.5))
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(source.calls(), 1);
        assert_eq!(provider.cached_snapshot().unwrap().rate("EUR"), Some(0.5));
    }

    #[tokio::test]
    async fn test_revalidate_leaves_fresh_snapshot_alone() {
        let source = Arc::new(MockSource::ok(&[("USD", 1.0)]));
        let provider = provider(source.clone(), Arc::new(MemorySnapshotStore::new()));
        assert!(provider.revalidate().is_none());

        provider.get_rates().await.unwrap();
        provider.revalidate().unwrap();
        tokio::task::yield_now().await;
        assert_eq!(source.calls(), 1);
    }

    /// Never answers the first request, answers every later one.
    struct HangsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for HangsOnce {
        async fn fetch_rates(&self, reference: &str) -> Result<RateSnapshot> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                futures::future::pending::<()>().await;
            }
            Ok(snapshot(reference, &[("USD", 1.0), ("EUR", 0.92)], Utc::now()))
        }
    }

    /// Answers the first request, fails every later one.
    struct AnswersOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for AnswersOnce {
        async fn fetch_rates(&self, reference: &str) -> Result<RateSnapshot> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(snapshot(reference, &[("USD", 1.0), ("EUR", 0.95)], Utc::now()))
            } else {
                Err(anyhow!("network down"))
            }
        }
    }

    /// Serves reads from an inner store but rejects every write.
    struct ReadOnlyStore(MemorySnapshotStore);

    #[async_trait]
    impl SnapshotStore for ReadOnlyStore {
        async fn read(&self, key: &str) -> Result<Option<RateSnapshot>> {
            self.0.read(key).await
        }

        async fn write(&self, _key: &str, _snapshot: &RateSnapshot) -> Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    fn hanging_provider(source: Arc<HangsOnce>) -> CachingRateProvider {
        CachingRateProvider::new(
            source,
            Arc::new(MemorySnapshotStore::new()),
            RateProviderOptions {
                fetch_timeout: std::time::Duration::from_millis(50),
                ..RateProviderOptions::default()
            },
        )
    }

    #[tokio::test]
    async fn test_hung_fetch_times_out_into_fallback_then_retries() {
        let source = Arc::new(HangsOnce {
            calls: AtomicUsize::new(0),
        });
        let provider = hanging_provider(source.clone());

        let first = provider.get_rates().await.unwrap();
        assert!(first.is_fallback());

        let second = provider.get_rates().await.unwrap();
        assert!(!second.is_fallback());
        assert_eq!(second.rate("EUR"), Some(0.92));
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_caller_giving_up_does_not_wedge_later_fetches() {
        let source = Arc::new(HangsOnce {
            calls: AtomicUsize::new(0),
        });
        let provider = hanging_provider(source.clone());

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_millis(5), provider.get_rates()).await;
        assert!(abandoned.is_err());
        assert!(provider.cached_snapshot().is_none());

        // Joins the abandoned fetch, which ends at the provider deadline
        assert!(provider.get_rates().await.unwrap().is_fallback());
        let live = provider.get_rates().await.unwrap();
        assert!(!live.is_fallback());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!provider.cached_snapshot().unwrap().is_fallback());
    }

    #[tokio::test]
    async fn test_newer_resident_snapshot_beats_older_stored_one() {
        let inner = MemorySnapshotStore::new();
        let older = snapshot(
            "USD",
            &[("USD", 1.0), ("EUR", 0.80)],
            Utc::now() - Duration::days(3),
        );
        inner.write("currency-rates", &older).await.unwrap();

        let source = Arc::new(AnswersOnce {
            calls: AtomicUsize::new(0),
        });
        // Zero window: every snapshot is stale right after it is fetched
        let provider = CachingRateProvider::new(
            source.clone(),
            Arc::new(ReadOnlyStore(inner)),
            RateProviderOptions {
                freshness: Duration::zero(),
                ..RateProviderOptions::default()
            },
        );

        // Live fetch succeeds but the write-through fails
        assert_eq!(provider.get_rates().await.unwrap().rate("EUR"), Some(0.95));

        let recovered = provider.get_rates().await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(recovered.rate("EUR"), Some(0.95));
        assert!(!recovered.is_fallback());
    }

    #[test]
    fn test_from_config_rejects_out_of_range_freshness() {
        let config = CurrencyConfig {
            freshness_hours: i64::MAX / 10,
            ..CurrencyConfig::default()
        };
        assert!(RateProviderOptions::from_config(&config).is_err());

        let options = RateProviderOptions::from_config(&CurrencyConfig::default()).unwrap();
        assert_eq!(options.freshness, Duration::hours(24));
        assert_eq!(options.fetch_timeout, std::time::Duration::from_secs(33));
    }
}
