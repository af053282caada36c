use crate::error::PriceError;
use crate::models::AssetClass;

use super::PriceQuote;

/// Anything that can produce a current price for a stock or a crypto symbol.
///
/// Live providers, the fallback chain and the cache all implement this one
/// trait, so decorators compose freely.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError>;

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError>;

    fn name(&self) -> &str;

    async fn price(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
        match asset_class {
            AssetClass::Stock => self.stock_price(symbol).await,
            AssetClass::Crypto => self.crypto_price(symbol).await,
        }
    }
}
