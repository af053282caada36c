use std::fmt::Display;

use rust_decimal::Decimal;

use crate::models::{AssetClass, Id};
use crate::portfolio::GroupKey;

/// Failure of a single price lookup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The symbol does not exist. Authoritative: no other provider is asked.
    #[error("invalid symbol: {asset_class} {symbol}")]
    InvalidSymbol {
        asset_class: AssetClass,
        symbol: String,
    },
    /// Transient upstream failure (network, rate limit, malformed response).
    #[error("price provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },
}

impl PriceError {
    pub fn invalid_symbol(asset_class: AssetClass, symbol: impl Into<String>) -> Self {
        Self::InvalidSymbol {
            asset_class,
            symbol: symbol.into(),
        }
    }

    pub fn unavailable(provider: impl Into<String>, message: impl Display) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn is_invalid_symbol(&self) -> bool {
        matches!(self, Self::InvalidSymbol { .. })
    }
}

/// The trade ledger cannot be turned into holdings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error(
        "insufficient holding for {group}: sell of {requested} exceeds available {available} (short by {shortfall})"
    )]
    InsufficientHolding {
        group: GroupKey,
        requested: Decimal,
        available: Decimal,
        shortfall: Decimal,
    },
    #[error("trade {trade_id} for {group} has non-positive quantity {quantity}")]
    NonPositiveQuantity {
        group: GroupKey,
        trade_id: Id,
        quantity: Decimal,
    },
    #[error("trade {trade_id} for {group} has negative unit price {unit_price}")]
    NegativeUnitPrice {
        group: GroupKey,
        trade_id: Id,
        unit_price: Decimal,
    },
    /// Quantity or cost left the representable decimal range.
    #[error("arithmetic overflow replaying trade {trade_id} for {group}")]
    Overflow { group: GroupKey, trade_id: Id },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FxError {
    #[error("no exchange rate from {base} to {currency}")]
    RateUnavailable { base: String, currency: String },
    #[error("converting {amount} {currency} to {base} overflows")]
    ConversionOverflow {
        base: String,
        currency: String,
        amount: Decimal,
    },
}
