use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::AssetClass;

/// A point-in-time price for one symbol, as returned by any price source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub asset_class: AssetClass,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub observed_at: DateTime<Utc>,
    /// Name of the provider that produced the quote.
    pub source: String,
}

/// A quote as persisted by a [`super::QuoteCacheStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedQuote {
    pub asset_class: AssetClass,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub currency: String,
    pub observed_at: DateTime<Utc>,
    pub source: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedQuote {
    pub fn from_quote(quote: &PriceQuote, expires_at: DateTime<Utc>) -> Self {
        Self {
            asset_class: quote.asset_class,
            symbol: quote.symbol.clone(),
            name: quote.name.clone(),
            price: quote.price,
            currency: quote.currency.clone(),
            observed_at: quote.observed_at,
            source: quote.source.clone(),
            expires_at,
        }
    }

    /// An entry is served only strictly before its expiry instant.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn into_quote(self) -> PriceQuote {
        PriceQuote {
            asset_class: self.asset_class,
            symbol: self.symbol,
            name: self.name,
            price: self.price,
            currency: self.currency,
            observed_at: self.observed_at,
            source: self.source,
        }
    }
}

/// Cache key for a quote: asset class and normalized symbol, e.g. `stock_AAPL`.
pub fn cache_key(asset_class: AssetClass, symbol: &str) -> String {
    format!("{}_{}", asset_class, symbol)
}
