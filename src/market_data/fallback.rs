use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::PriceError;
use crate::models::AssetClass;

use super::{PriceQuote, PriceSource};

/// Primary/secondary provider chain.
///
/// The secondary is asked once when the primary fails for any reason other
/// than an invalid symbol. An invalid symbol from the primary is final.
pub struct FallbackPriceSource {
    primary: Arc<dyn PriceSource>,
    secondary: Option<Arc<dyn PriceSource>>,
}

impl FallbackPriceSource {
    pub fn new(primary: Arc<dyn PriceSource>, secondary: Arc<dyn PriceSource>) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    /// A chain with no secondary behaves exactly like the primary.
    pub fn primary_only(primary: Arc<dyn PriceSource>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    async fn fetch(&self, asset_class: AssetClass, symbol: &str) -> Result<PriceQuote, PriceError> {
        let err = match self.primary.price(asset_class, symbol).await {
            Ok(quote) => return Ok(quote),
            Err(err) => err,
        };

        if err.is_invalid_symbol() {
            debug!(
                asset_class = %asset_class,
                symbol = %symbol,
                primary = self.primary.name(),
                "primary reports invalid symbol; not falling back"
            );
            return Err(err);
        }

        let Some(secondary) = &self.secondary else {
            return Err(err);
        };

        warn!(
            asset_class = %asset_class,
            symbol = %symbol,
            primary = self.primary.name(),
            secondary = secondary.name(),
            error = %err,
            "primary price source failed, trying secondary"
        );
        secondary.price(asset_class, symbol).await
    }
}

#[async_trait::async_trait]
impl PriceSource for FallbackPriceSource {
    async fn stock_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.fetch(AssetClass::Stock, symbol).await
    }

    async fn crypto_price(&self, symbol: &str) -> Result<PriceQuote, PriceError> {
        self.fetch(AssetClass::Crypto, symbol).await
    }

    fn name(&self) -> &str {
        "fallback"
    }
}
