//! Taiwan Stock Exchange real-time quotes.
//!
//! TWSE's `getStockInfo.jsp` endpoint rejects most non-browser clients, so the
//! request is relayed through a raw pass-through proxy
//! (`{proxy}/raw?url=<encoded upstream url>`). Listed codes are numeric
//! (`2330`, `0050`) and prices are in TWD. An empty `msgArray` or a price
//! field that is not a positive number (TWSE sends `-` before the first
//! trade of the day) is reported as an invalid symbol.

use std::str::FromStr;

use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::PriceError;
use crate::market_data::PriceQuote;
use crate::models::{normalize_symbol, AssetClass};

const PROXY_BASE_URL: &str = "https://api.allorigins.win";
const TWSE_STOCK_INFO_URL: &str = "https://mis.twse.com.tw/stock/api/getStockInfo.jsp";
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const NAME: &str = "twse";

#[derive(Debug, Deserialize)]
struct StockInfoResponse {
    #[serde(rename = "msgArray", default)]
    msg_array: Vec<StockInfo>,
}

#[derive(Debug, Deserialize)]
struct StockInfo {
    /// Stock code
    #[allow(dead_code)]
    c: Option<String>,
    /// Stock name
    n: Option<String>,
    /// Latest trade price
    z: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TwseQuoteClient {
    client: Client,
    proxy_base_url: String,
}

impl TwseQuoteClient {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            proxy_base_url: PROXY_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.proxy_base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn name(&self) -> &str {
        NAME
    }

    fn upstream_url(symbol: &str) -> String {
        format!(
            "{TWSE_STOCK_INFO_URL}?ex_ch=tse_{symbol}.tw&_={}",
            Utc::now().timestamp_millis()
        )
    }

    pub async fn quote(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(PriceError::invalid_symbol(AssetClass::Stock, symbol));
        }

        let url = format!(
            "{}/raw?url={}",
            self.proxy_base_url,
            urlencoding::encode(&Self::upstream_url(&symbol))
        );

        let response = self
            .client
            .get(&url)
            .header("User-Agent", BROWSER_USER_AGENT)
            .send()
            .await
            .map_err(|e| PriceError::unavailable(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::unavailable(NAME, format!("HTTP {status}")));
        }

        let body: StockInfoResponse = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(NAME, format!("undecodable stock info: {e}")))?;

        let Some(info) = body.msg_array.into_iter().next() else {
            return Err(PriceError::invalid_symbol(AssetClass::Stock, symbol));
        };

        let price = info
            .z
            .as_deref()
            .and_then(|z| Decimal::from_str(z.trim()).ok())
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| PriceError::invalid_symbol(AssetClass::Stock, symbol.clone()))?;

        Ok(PriceQuote {
            asset_class: AssetClass::Stock,
            name: info.n.unwrap_or_else(|| symbol.clone()),
            symbol,
            price: price.normalize(),
            currency: "TWD".to_string(),
            observed_at: Utc::now(),
            source: NAME.to_string(),
        })
    }
}

impl Default for TwseQuoteClient {
    fn default() -> Self {
        Self::new()
    }
}
