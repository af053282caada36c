use std::path::Path;
use std::sync::Arc;

use reqwest::Client;
use tracing::info;

use crate::clock::Clock;
use crate::config::Config;

use super::providers::{
    BinanceQuoteClient, ExchangeQuoteSource, FmpQuoteClient, GeminiPriceSource, TwseQuoteClient,
};
use super::{
    CacheSweeper, CachingPriceSource, FallbackPriceSource, JsonFileQuoteCacheStore,
    MemoryQuoteCacheStore, PriceSource, QuoteCacheStore, SweeperHandle,
};

/// The standard pricing stack: exchange feeds with an optional generative
/// fallback, behind a TTL cache whose expired entries are swept in the
/// background.
pub struct PricingPipeline {
    source: Arc<CachingPriceSource>,
    sweeper: SweeperHandle,
}

impl PricingPipeline {
    /// Assemble the pipeline and start the sweeper on the current runtime.
    pub fn build(config: &Config, store: Arc<dyn QuoteCacheStore>, clock: Arc<dyn Clock>) -> Self {
        let client = Client::new();
        let providers = &config.providers;

        let mut us_stocks = FmpQuoteClient::with_client(providers.fmp_api_key.clone(), client.clone());
        if let Some(url) = &providers.fmp_base_url {
            us_stocks = us_stocks.with_base_url(url);
        }
        let mut tw_stocks = TwseQuoteClient::with_client(client.clone());
        if let Some(url) = &providers.twse_proxy_url {
            tw_stocks = tw_stocks.with_base_url(url);
        }
        let mut crypto = BinanceQuoteClient::with_client(client.clone());
        if let Some(url) = &providers.binance_base_url {
            crypto = crypto.with_base_url(url);
        }
        let primary: Arc<dyn PriceSource> =
            Arc::new(ExchangeQuoteSource::from_parts(us_stocks, tw_stocks, crypto));

        let secondary: Option<Arc<dyn PriceSource>> = providers.gemini_api_key.clone().map(|key| {
            let mut gemini = GeminiPriceSource::with_client(key, client.clone())
                .with_model(providers.gemini_model.clone());
            if let Some(url) = &providers.gemini_base_url {
                gemini = gemini.with_base_url(url);
            }
            Arc::new(gemini) as Arc<dyn PriceSource>
        });

        info!(
            fallback = secondary.is_some(),
            cache_ttl_secs = config.pricing.cache_ttl.as_secs(),
            sweep_interval_secs = config.pricing.sweep_interval.as_secs(),
            "pricing pipeline assembled"
        );

        let chain: Arc<dyn PriceSource> = Arc::new(match secondary {
            Some(secondary) => FallbackPriceSource::new(primary, secondary),
            None => FallbackPriceSource::primary_only(primary),
        });
        Self::from_source(chain, config, store, clock)
    }

    /// Wrap an arbitrary source in the cache and start the sweeper.
    pub fn from_source(
        inner: Arc<dyn PriceSource>,
        config: &Config,
        store: Arc<dyn QuoteCacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let source = Arc::new(
            CachingPriceSource::new(inner, store.clone())
                .with_ttl(config.pricing.cache_ttl)
                .with_clock(clock.clone()),
        );
        let sweeper = CacheSweeper::new(store)
            .with_interval(config.pricing.sweep_interval)
            .with_clock(clock)
            .spawn();

        Self { source, sweeper }
    }

    pub fn source(&self) -> Arc<dyn PriceSource> {
        self.source.clone()
    }

    pub fn cache(&self) -> &CachingPriceSource {
        &self.source
    }

    /// Stop the background sweep and wait for it to exit.
    pub async fn shutdown(self) {
        self.sweeper.shutdown().await;
    }
}

/// The cache store named by the config: a JSON file when `cache_path` is set,
/// otherwise process memory. Relative paths resolve against `config_dir`.
pub fn cache_store_for(config: &Config, config_dir: &Path) -> Arc<dyn QuoteCacheStore> {
    match config.resolve_cache_path(config_dir) {
        Some(path) => Arc::new(JsonFileQuoteCacheStore::new(path)),
        None => Arc::new(MemoryQuoteCacheStore::new()),
    }
}
