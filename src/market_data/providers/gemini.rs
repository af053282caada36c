//! Generative price source backed by Gemini with Google Search grounding.
//!
//! Used as the last resort behind the exchange feeds. The model is asked to
//! reply with a single JSON object; replies wrapped in markdown fences are
//! unwrapped, an `{"error": ...}` reply means the symbol is unknown, and a
//! stock quoted in a currency other than its market's is rejected.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::PriceError;
use crate::market_data::{PriceQuote, PriceSource};
use crate::models::{normalize_currency_code, normalize_symbol, AssetClass};

use super::is_taiwan_listed;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash";
const NAME: &str = "gemini";

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerReply {
    price: Decimal,
    symbol: Option<String>,
    name: Option<String>,
    currency: String,
}

/// Stock markets the prompt distinguishes, keyed off the symbol shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Market {
    Us,
    Tw,
}

impl Market {
    fn for_stock(symbol: &str) -> Self {
        if is_taiwan_listed(symbol) {
            Market::Tw
        } else {
            Market::Us
        }
    }

    fn code(self) -> &'static str {
        match self {
            Market::Us => "US",
            Market::Tw => "TW",
        }
    }

    fn currency(self) -> &'static str {
        match self {
            Market::Us => "USD",
            Market::Tw => "TWD",
        }
    }
}

pub struct GeminiPriceSource {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl GeminiPriceSource {
    pub fn new(api_key: SecretString) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: SecretString, client: Client) -> Self {
        Self {
            client,
            api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, PriceError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{ "google_search": {} }],
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| PriceError::unavailable(NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::unavailable(NAME, format!("HTTP {status}")));
        }

        let reply: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PriceError::unavailable(NAME, format!("undecodable response: {e}")))?;

        let text: String = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(PriceError::unavailable(NAME, "empty model reply"));
        }
        Ok(text)
    }

    async fn quote(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(PriceError::invalid_symbol(asset_class, symbol));
        }

        let now = Utc::now();
        let (prompt, expected_currency) = match asset_class {
            AssetClass::Stock => {
                let market = Market::for_stock(&symbol);
                (stock_prompt(now, market, &symbol), Some(market.currency()))
            }
            AssetClass::Crypto => (crypto_prompt(now, &symbol), None),
        };

        debug!(model = %self.model, asset_class = %asset_class, symbol = %symbol, "asking model for price");
        let text = self.generate(&prompt).await?;
        parse_reply(asset_class, &symbol, &text, expected_currency, now)
    }
}

#[async_trait::async_trait]
impl PriceSource for GeminiPriceSource {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.quote(AssetClass::Stock, symbol).await
    }

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.quote(AssetClass::Crypto, symbol).await
    }

    fn name(&self) -> &str {
        NAME
    }
}

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").ok())
        .as_ref()
}

/// Removes a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    match fence_regex()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
    {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

fn parse_reply(
    asset_class: AssetClass,
    symbol: &str,
    text: &str,
    expected_currency: Option<&str>,
    observed_at: DateTime<Utc>,
) -> Result<PriceQuote, PriceError> {
    let payload = strip_code_fence(text);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| PriceError::unavailable(NAME, format!("model reply is not JSON: {e}")))?;

    if value.get("error").is_some() {
        return Err(PriceError::invalid_symbol(asset_class, symbol));
    }

    let reply: TickerReply = serde_json::from_value(value)
        .map_err(|e| PriceError::unavailable(NAME, format!("malformed model reply: {e}")))?;

    let currency = normalize_currency_code(&reply.currency);
    if let Some(expected) = expected_currency {
        if currency != expected {
            debug!(symbol = %symbol, currency = %currency, expected = %expected, "model quoted wrong market currency");
            return Err(PriceError::invalid_symbol(asset_class, symbol));
        }
    }
    if reply.price <= Decimal::ZERO {
        return Err(PriceError::unavailable(NAME, format!("non-positive price {}", reply.price)));
    }

    let quoted_symbol = reply
        .symbol
        .map(|s| normalize_symbol(&s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| symbol.to_string());

    Ok(PriceQuote {
        asset_class,
        name: reply.name.unwrap_or_else(|| quoted_symbol.clone()),
        symbol: quoted_symbol,
        price: reply.price,
        currency,
        observed_at,
        source: NAME.to_string(),
    })
}

const REPLY_FORMAT: &str = r#"{
  "price": <current price, number>,
  "symbol": "<standardized symbol, uppercase>",
  "name": "<official full name>",
  "currency": "<currency of the price, e.g. USD>"
}"#;

fn stock_prompt(now: DateTime<Utc>, market: Market, symbol: &str) -> String {
    format!(
        "Today is {today}. Look up the current real-time price of the stock below and reply with ONLY this JSON object and no other text:\n\n\
         {REPLY_FORMAT}\n\n\
         Requirements:\n\
         1. price is a number with up to four decimal places and no trailing zeros; use more precision for assets priced below 0.01.\n\
         2. symbol is the listed ticker in uppercase.\n\
         3. name is the official company name.\n\
         4. currency is the currency the price is quoted in on that market.\n\
         5. If the code is not listed on the given market or no price can be found, reply with exactly {{\"error\": \"Invalid stock or asset code for the specified market, or data unavailable\"}}.\n\n\
         Market: {market}, Input code: {symbol}",
        today = now.to_rfc3339(),
        market = market.code(),
    )
}

fn crypto_prompt(now: DateTime<Utc>, symbol: &str) -> String {
    format!(
        "Today is {today}. Look up the current real-time price of the crypto asset below and reply with ONLY this JSON object and no other text:\n\n\
         {REPLY_FORMAT}\n\n\
         Requirements:\n\
         1. price is a number with up to four decimal places and no trailing zeros; use up to eight decimal places for low-priced tokens.\n\
         2. symbol is the input symbol in uppercase.\n\
         3. name is the official name of the asset (e.g. BTC is Bitcoin).\n\
         4. currency is the quote currency of the price (e.g. USDT).\n\
         5. If the symbol is unknown or no price can be found, reply with exactly {{\"error\": \"Invalid crypto or asset code, or data unavailable\"}}.\n\n\
         Input symbol: {symbol}",
        today = now.to_rfc3339(),
    )
}
