use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::PriceError;
use crate::models::{normalize_symbol, AssetClass};

use super::{cache_key, CachedQuote, PriceQuote, PriceSource, QuoteCacheStore};

/// Time a fetched quote stays servable from the cache.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(20 * 60);

/// Read-through, write-through TTL cache in front of another price source.
///
/// Failures from the wrapped source are propagated and never cached.
pub struct CachingPriceSource {
    inner: Arc<dyn PriceSource>,
    store: Arc<dyn QuoteCacheStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CachingPriceSource {
    pub fn new(inner: Arc<dyn PriceSource>, store: Arc<dyn QuoteCacheStore>) -> Self {
        Self {
            inner,
            store,
            ttl: DEFAULT_CACHE_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> Arc<dyn QuoteCacheStore> {
        self.store.clone()
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Fresh cached quote for `key`, evicting it if it has expired.
    /// Store failures count as a miss.
    async fn lookup(&self, key: &str) -> Option<PriceQuote> {
        let entry = match self.store.get(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %key, error = %err, "quote cache read failed; treating as miss");
                return None;
            }
        };

        let now = self.clock.now();
        if entry.is_fresh(now) {
            debug!(key = %key, expires_at = %entry.expires_at, "quote cache hit");
            return Some(entry.into_quote());
        }

        debug!(key = %key, expired_at = %entry.expires_at, "quote cache entry expired");
        match self.store.delete_if_expired(key, now).await {
            Ok(true) => {}
            Ok(false) => debug!(key = %key, "expired quote already replaced; kept"),
            Err(err) => warn!(key = %key, error = %err, "failed to evict expired quote"),
        }
        None
    }

    async fn fetch(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
        let symbol = normalize_symbol(symbol);
        let key = cache_key(asset_class, &symbol);

        if let Some(quote) = self.lookup(&key).await {
            return Ok(quote);
        }

        let quote = self.inner.price(asset_class, &symbol).await?;

        let entry = CachedQuote::from_quote(&quote, self.expiry_from(self.clock.now()));
        match self.store.set(&key, &entry).await {
            Ok(()) => info!(
                key = %key,
                price = %quote.price,
                currency = %quote.currency,
                source = %quote.source,
                "quote fetched and cached"
            ),
            Err(err) => warn!(key = %key, error = %err, "failed to cache fetched quote"),
        }

        Ok(quote)
    }
}

#[async_trait::async_trait]
impl PriceSource for CachingPriceSource {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.fetch(AssetClass::Stock, symbol).await
    }

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.fetch(AssetClass::Crypto, symbol).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::market_data::MemoryQuoteCacheStore;
    use anyhow::Result;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a new price on each call (100, 101, ...) or a scripted error.
    struct CountingSource {
        calls: AtomicUsize,
        fail_with: Mutex<Option<PriceError>>,
        clock: Arc<dyn Clock>,
    }

    impl CountingSource {
        fn new(clock: Arc<dyn Clock>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_with: Mutex::new(None),
                clock,
            })
        }

        fn fail_with(&self, err: Option<PriceError>) {
            *self.fail_with.lock().unwrap() = err;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn respond(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.fail_with.lock().unwrap().clone() {
                return Err(err);
            }
            Ok(PriceQuote {
                asset_class,
                symbol: symbol.to_string(),
                name: format!("{symbol} name"),
                price: Decimal::from(100 + n as i64),
                currency: "USD".to_string(),
                observed_at: self.clock.now(),
                source: "counting".to_string(),
            })
        }
    }

    #[async_trait::async_trait]
    impl PriceSource for CountingSource {
        async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
            self.respond(AssetClass::Stock, symbol)
        }

        async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
            self.respond(AssetClass::Crypto, symbol)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn setup() -> (Arc<ManualClock>, Arc<CountingSource>, Arc<MemoryQuoteCacheStore>, CachingPriceSource) {
        let start = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let source = CountingSource::new(clock.clone());
        let store = Arc::new(MemoryQuoteCacheStore::new());
        let cache = CachingPriceSource::new(source.clone(), store.clone())
            .with_ttl(Duration::from_secs(20 * 60))
            .with_clock(clock.clone());
        (clock, source, store, cache)
    }

    #[tokio::test]
    async fn hit_before_expiry_returns_identical_quote() -> Result<()> {
        let (clock, source, _store, cache) = setup();

        let first = cache.stock_price("aapl").await?;
        clock.advance(chrono::Duration::minutes(19));
        let second = cache.stock_price("AAPL").await?;

        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_is_evicted() -> Result<()> {
        let (clock, source, store, cache) = setup();

        cache.crypto_price("BTC").await?;
        clock.advance(chrono::Duration::minutes(20));

        // The expired entry is removed on lookup even if the refetch fails.
        source.fail_with(Some(PriceError::unavailable("counting", "down")));
        assert!(cache.crypto_price("BTC").await.is_err());
        assert!(store.get("crypto_BTC").await?.is_none());

        source.fail_with(None);
        let refreshed = cache.crypto_price("BTC").await?;
        assert_eq!(refreshed.price, Decimal::from(102));
        assert_eq!(source.calls(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn failures_are_never_cached() -> Result<()> {
        let (_clock, source, store, cache) = setup();
        source.fail_with(Some(PriceError::invalid_symbol(AssetClass::Stock, "NOPE")));

        assert!(cache.stock_price("NOPE").await.unwrap_err().is_invalid_symbol());
        assert!(cache.stock_price("NOPE").await.is_err());

        assert_eq!(source.calls(), 2);
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn write_through_sets_expiry_from_ttl() -> Result<()> {
        let (clock, _source, store, cache) = setup();
        let now = clock.now();

        cache.stock_price("MSFT").await?;

        let entry = store.get("stock_MSFT").await?.expect("cached");
        assert_eq!(entry.expires_at, now + chrono::Duration::minutes(20));
        Ok(())
    }

    #[tokio::test]
    async fn asset_classes_do_not_share_entries() -> Result<()> {
        let (_clock, source, _store, cache) = setup();

        cache.stock_price("COIN").await?;
        cache.crypto_price("COIN").await?;

        assert_eq!(source.calls(), 2);
        Ok(())
    }

    /// Serves a read taken before another writer refreshed the entry.
    struct StaleReadStore {
        inner: MemoryQuoteCacheStore,
        stale: CachedQuote,
    }

    #[async_trait::async_trait]
    impl QuoteCacheStore for StaleReadStore {
        async fn get(&self, _key: &str) -> Result<Option<CachedQuote>> {
            Ok(Some(self.stale.clone()))
        }

        async fn set(&self, key: &str, entry: &CachedQuote) -> Result<()> {
            self.inner.set(key, entry).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
            self.inner.delete_if_expired(key, now).await
        }

        async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
            self.inner.delete_expired(now).await
        }
    }

    #[tokio::test]
    async fn eviction_keeps_an_entry_refreshed_after_the_read() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).unwrap();
        let clock = Arc::new(ManualClock::new(now));
        let source = CountingSource::new(clock.clone());
        source.fail_with(Some(PriceError::unavailable("counting", "down")));

        let quote = |price: i64| PriceQuote {
            asset_class: AssetClass::Stock,
            symbol: "AAPL".to_string(),
            name: "AAPL name".to_string(),
            price: Decimal::from(price),
            currency: "USD".to_string(),
            observed_at: now,
            source: "counting".to_string(),
        };
        let fresh = CachedQuote::from_quote(&quote(150), now + chrono::Duration::minutes(10));
        let store = Arc::new(StaleReadStore {
            inner: MemoryQuoteCacheStore::new(),
            stale: CachedQuote::from_quote(&quote(140), now - chrono::Duration::minutes(1)),
        });
        store.inner.set("stock_AAPL", &fresh).await?;

        let cache = CachingPriceSource::new(source.clone(), store.clone()).with_clock(clock);
        assert!(cache.stock_price("AAPL").await.is_err());

        assert_eq!(store.inner.get("stock_AAPL").await?, Some(fresh));
        assert_eq!(source.calls(), 1);
        Ok(())
    }
}
