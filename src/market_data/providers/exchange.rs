use reqwest::Client;
use secrecy::SecretString;

use crate::error::PriceError;
use crate::market_data::{PriceQuote, PriceSource};

use super::{is_taiwan_listed, BinanceQuoteClient, FmpQuoteClient, TwseQuoteClient};

/// Deterministic market-data source backed by exchange quote feeds.
///
/// Stocks whose code starts with a digit go to the Taiwan exchange, other
/// stocks to the US quote feed, crypto to Binance.
pub struct ExchangeQuoteSource {
    us_stocks: FmpQuoteClient,
    tw_stocks: TwseQuoteClient,
    crypto: BinanceQuoteClient,
}

impl ExchangeQuoteSource {
    pub fn new(fmp_api_key: Option<SecretString>) -> Self {
        let client = Client::new();
        Self {
            us_stocks: FmpQuoteClient::with_client(fmp_api_key, client.clone()),
            tw_stocks: TwseQuoteClient::with_client(client.clone()),
            crypto: BinanceQuoteClient::with_client(client),
        }
    }

    pub fn from_parts(
        us_stocks: FmpQuoteClient,
        tw_stocks: TwseQuoteClient,
        crypto: BinanceQuoteClient,
    ) -> Self {
        Self {
            us_stocks,
            tw_stocks,
            crypto,
        }
    }
}

#[async_trait::async_trait]
impl PriceSource for ExchangeQuoteSource {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        if is_taiwan_listed(symbol) {
            self.tw_stocks.quote(symbol).await
        } else {
            self.us_stocks.quote(symbol).await
        }
    }

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.crypto.quote(symbol).await
    }

    fn name(&self) -> &str {
        "exchange"
    }
}
