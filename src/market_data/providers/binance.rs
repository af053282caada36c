//! Binance spot ticker price feed for crypto quotes.
//!
//! Symbols are quoted against USDT (`BTC` is looked up as `BTCUSDT`), so the
//! returned currency is always `USDT`. Binance answers HTTP 400 for unknown
//! trading pairs, which is reported as an invalid symbol.

use std::str::FromStr;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::PriceError;
use crate::market_data::PriceQuote;
use crate::models::{normalize_symbol, AssetClass};

const BINANCE_BASE_URL: &str = "https://data-api.binance.vision";
const QUOTE_ASSET: &str = "USDT";
const NAME: &str = "binance";

#[derive(Debug, Deserialize)]
struct TickerPrice {
    #[allow(dead_code)]
    symbol: String,
    price: String,
}

#[derive(Debug, Clone)]
pub struct BinanceQuoteClient {
    client: Client,
    base_url: String,
}

impl BinanceQuoteClient {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn name(&self) -> &str {
        NAME
    }

    pub async fn quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(PriceError::invalid_symbol(AssetClass::Crypto, symbol));
        }

        let url = format!("{}/api/v3/ticker/price", self.base_url);
        let pair = format!("{symbol}{QUOTE_ASSET}");
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", pair.as_str())])
            .send()
            .await
            .map_err(|e| PriceError::unavailable(NAME, e))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return Err(PriceError::invalid_symbol(AssetClass::Crypto, symbol));
        }
        if !status.is_success() {
            return Err(PriceError::unavailable(NAME, format!("HTTP {status}")));
        }

        let ticker: TickerPrice = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(NAME, format!("undecodable ticker: {e}")))?;
        let price = Decimal::from_str(ticker.price.trim())
            .map_err(|e| PriceError::unavailable(NAME, format!("invalid price {:?}: {e}", ticker.price)))?;

        Ok(PriceQuote {
            asset_class: AssetClass::Crypto,
            name: symbol.clone(),
            symbol,
            price,
            currency: QUOTE_ASSET.to_string(),
            observed_at: Utc::now(),
            source: NAME.to_string(),
        })
    }
}

impl Default for BinanceQuoteClient {
    fn default() -> Self {
        Self::new()
    }
}
