use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};

use super::QuoteCacheStore;

/// How often expired quotes are purged, independent of request traffic.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);

/// Periodically deletes expired entries from a quote cache store.
pub struct CacheSweeper {
    store: Arc<dyn QuoteCacheStore>,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheSweeper {
    pub fn new(store: Arc<dyn QuoteCacheStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_SWEEP_INTERVAL);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub async fn sweep_once(&self) -> Result<usize> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "swept expired quotes from cache");
        } else {
            debug!("quote cache sweep found nothing to remove");
        }
        Ok(removed)
    }

    /// Start sweeping on the current tokio runtime. The first sweep runs one
    /// interval after spawning. Dropping the handle also stops the task.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval_secs = period.as_secs(), "quote cache sweeper started");

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.sweep_once().await {
                            warn!(error = %err, "quote cache sweep failed");
                        }
                    }
                }
            }

            debug!("quote cache sweeper stopped");
        });

        SweeperHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Owner of a running sweep task.
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweep loop to stop and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "quote cache sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::market_data::{CachedQuote, MemoryQuoteCacheStore};
    use crate::models::AssetClass;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn entry(expires_at: DateTime<Utc>) -> CachedQuote {
        CachedQuote {
            asset_class: AssetClass::Crypto,
            symbol: "ETH".to_string(),
            name: "Ethereum".to_string(),
            price: dec!(3100),
            currency: "USDT".to_string(),
            observed_at: expires_at,
            source: "test".to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn sweep_once_removes_only_expired() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2025, 5, 5, 5, 0, 0).unwrap();
        let store = Arc::new(MemoryQuoteCacheStore::new());
        store.set("a", &entry(now - chrono::Duration::minutes(1))).await?;
        store.set("b", &entry(now + chrono::Duration::minutes(1))).await?;

        let sweeper = CacheSweeper::new(store.clone()).with_clock(Arc::new(FixedClock::new(now)));
        assert_eq!(sweeper.sweep_once().await?, 1);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn spawned_sweeper_runs_until_shutdown() -> Result<()> {
        let now = Utc.with_ymd_and_hms(2025, 5, 5, 5, 0, 0).unwrap();
        let store = Arc::new(MemoryQuoteCacheStore::new());
        store.set("stale", &entry(now - chrono::Duration::minutes(1))).await?;

        let handle = CacheSweeper::new(store.clone())
            .with_interval(Duration::from_millis(20))
            .with_clock(Arc::new(FixedClock::new(now)))
            .spawn();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(store.is_empty().await);
        assert!(!handle.is_finished());

        handle.shutdown().await;
        Ok(())
    }

    #[tokio::test]
    async fn dropping_handle_stops_task() -> Result<()> {
        let store = Arc::new(MemoryQuoteCacheStore::new());
        let handle = CacheSweeper::new(store)
            .with_interval(Duration::from_millis(20))
            .spawn();
        let SweeperHandle { shutdown, task } = handle;
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(2), task).await??;
        Ok(())
    }
}
