mod cache;
mod fallback;
mod fx;
mod json_store;
mod models;
#[cfg(feature = "providers")]
mod pipeline;
#[cfg(feature = "providers")]
pub mod providers;
mod source;
mod store;
mod sweeper;

pub use cache::{CachingPriceSource, DEFAULT_CACHE_TTL};
pub use fallback::FallbackPriceSource;
pub use fx::{ExchangeRateProvider, ExchangeRateSet, MemoryExchangeRateStore, StoredRate};
pub use json_store::JsonFileQuoteCacheStore;
pub use models::{cache_key, CachedQuote, PriceQuote};
#[cfg(feature = "providers")]
pub use pipeline::{cache_store_for, PricingPipeline};
pub use source::PriceSource;
pub use store::{MemoryQuoteCacheStore, QuoteCacheStore};
pub use sweeper::{CacheSweeper, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
