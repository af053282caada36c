//! Financial Modeling Prep real-time quotes for US-listed stocks.
//!
//! Uses the `/stable/quote` endpoint. An empty result array means the ticker
//! is unknown. Prices are always in USD.

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::PriceError;
use crate::market_data::PriceQuote;
use crate::models::{normalize_symbol, AssetClass};

const FMP_BASE_URL: &str = "https://financialmodelingprep.com";
const NAME: &str = "fmp";

#[derive(Debug, Deserialize)]
struct FmpQuote {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    price: Decimal,
}

pub struct FmpQuoteClient {
    client: Client,
    api_key: Option<SecretString>,
    base_url: String,
}

impl FmpQuoteClient {
    pub fn new(api_key: Option<SecretString>) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: Option<SecretString>, client: Client) -> Self {
        Self {
            client,
            api_key,
            base_url: FMP_BASE_URL.to_string(),
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
            return Err(PriceError::invalid_symbol(AssetClass::Stock, symbol));
        }
        let Some(api_key) = &self.api_key else {
            return Err(PriceError::unavailable(NAME, "no API key configured"));
        };

        let url = format!("{}/stable/quote", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol.as_str()), ("apikey", api_key.expose_secret())])
            .send()
            .await
            .map_err(|e| PriceError::unavailable(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::unavailable(NAME, format!("HTTP {status}")));
        }

        let quotes: Vec<FmpQuote> = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(NAME, format!("undecodable quote: {e}")))?;

        let Some(quote) = quotes.into_iter().next() else {
            return Err(PriceError::invalid_symbol(AssetClass::Stock, symbol));
        };

        Ok(PriceQuote {
            asset_class: AssetClass::Stock,
            name: quote.name.unwrap_or_else(|| quote.symbol.clone()),
            symbol: quote.symbol,
            price: quote.price,
            currency: "USD".to_string(),
            observed_at: Utc::now(),
            source: NAME.to_string(),
        })
    }
}
