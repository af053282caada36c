#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use assetbook::error::PriceError;
use assetbook::market_data::{PriceQuote, PriceSource};
use assetbook::models::{AssetClass, Trade};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).expect("valid test date")
}

pub fn buy(ticker: &str, quantity: Decimal, price: Decimal, d: u32) -> Trade {
    Trade::buy(AssetClass::Stock, ticker, quantity, price, "USD", day(d))
}

pub fn sell(ticker: &str, quantity: Decimal, price: Decimal, d: u32) -> Trade {
    Trade::sell(AssetClass::Stock, ticker, quantity, price, "USD", day(d))
}

pub fn quote(asset_class: AssetClass, symbol: &str, price: Decimal, currency: &str) -> PriceQuote {
    PriceQuote {
        asset_class,
        symbol: symbol.to_string(),
        name: format!("{symbol} name"),
        price,
        currency: currency.to_string(),
        observed_at: Utc::now(),
        source: "mock".to_string(),
    }
}

/// Price source with scripted per-symbol answers and a call counter.
/// Unscripted symbols are `ProviderUnavailable`.
pub struct MockPriceSource {
    name: String,
    answers: Mutex<HashMap<(AssetClass, String), Result<PriceQuote, PriceError>>>,
    calls: AtomicUsize,
}

impl MockPriceSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_price(self, asset_class: AssetClass, symbol: &str, price: Decimal, currency: &str) -> Self {
        self.answers
            .lock()
            .expect("mock lock")
            .insert((asset_class, symbol.to_string()), Ok(quote(asset_class, symbol, price, currency)));
        self
    }

    pub fn with_error(self, asset_class: AssetClass, symbol: &str, error: PriceError) -> Self {
        self.answers
            .lock()
            .expect("mock lock")
            .insert((asset_class, symbol.to_string()), Err(error));
        self
    }

    pub fn set_price(&self, asset_class: AssetClass, symbol: &str, price: Decimal, currency: &str) {
        self.answers
            .lock()
            .expect("mock lock")
            .insert((asset_class, symbol.to_string()), Ok(quote(asset_class, symbol, price, currency)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut result = self
            .answers
            .lock()
            .expect("mock lock")
            .get(&(asset_class, symbol.to_string()))
            .cloned()
            .unwrap_or_else(|| Err(PriceError::unavailable(&self.name, "not scripted")));
        if let Ok(quote) = &mut result {
            quote.source = self.name.clone();
        }
        result
    }
}

#[async_trait::async_trait]
impl PriceSource for MockPriceSource {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.answer(AssetClass::Stock, symbol)
    }

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.answer(AssetClass::Crypto, symbol)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
