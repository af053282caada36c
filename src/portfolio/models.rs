use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{normalize_currency_code, normalize_symbol, AssetClass, Id, Trade};

/// Identity of one position: the same ticker held in two currencies is two
/// positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub asset_class: AssetClass,
    pub ticker: String,
    pub currency: String,
}

impl GroupKey {
    pub fn new(
        asset_class: AssetClass,
        ticker: impl AsRef<str>,
        currency: impl AsRef<str>,
    ) -> Self {
        Self {
            asset_class,
            ticker: normalize_symbol(ticker.as_ref()),
            currency: normalize_currency_code(currency.as_ref()),
        }
    }

    pub fn for_trade(trade: &Trade) -> Self {
        Self::new(trade.asset_class, &trade.ticker, &trade.currency)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.asset_class, self.ticker, self.currency)
    }
}

/// Remaining quantity from one buy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lot {
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Ledger position of the buy that opened the lot.
    pub sequence: usize,
}

/// A valued position derived from the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub ticker_name: String,
    pub asset_class: AssetClass,
    pub currency: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub total_cost: Decimal,
    /// Zero when no price could be fetched.
    pub current_price: Decimal,
    pub total_value: Decimal,
    /// `None` when no exchange rate to the display currency exists.
    pub total_value_in_display_currency: Option<Decimal>,
    pub gain_loss: Decimal,
    pub gain_loss_percentage: Decimal,
}

impl Holding {
    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.asset_class, &self.ticker, &self.currency)
    }
}

/// One converted contribution to a user's total value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValuationLineItem {
    Holding {
        key: String,
        amount: Decimal,
        currency: String,
        converted: Decimal,
    },
    Account {
        account_id: Id,
        name: String,
        amount: Decimal,
        currency: String,
        converted: Decimal,
    },
}

impl ValuationLineItem {
    pub fn converted(&self) -> Decimal {
        match self {
            ValuationLineItem::Holding { converted, .. }
            | ValuationLineItem::Account { converted, .. } => *converted,
        }
    }

    /// The unconverted amount, as reported when the item is left out.
    pub fn into_skipped(self) -> SkippedItem {
        match self {
            ValuationLineItem::Holding {
                key,
                amount,
                currency,
                ..
            } => SkippedItem {
                label: key,
                amount,
                currency,
            },
            ValuationLineItem::Account {
                name,
                amount,
                currency,
                ..
            } => SkippedItem {
                label: name,
                amount,
                currency,
            },
        }
    }
}

/// An amount left out of a total because it could not be converted or added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub label: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalValuation {
    pub user_id: Id,
    pub currency: String,
    pub total_value: Decimal,
    pub line_items: Vec<ValuationLineItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedItem>,
    pub as_of: DateTime<Utc>,
}

/// Net worth of one user on one day, in their display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyValueSnapshot {
    pub user_id: Id,
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account_id: Id,
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
    /// `None` when no exchange rate to the display currency exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance_in_display_currency: Option<Decimal>,
}
