use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AssetClass, Id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeType {
    Buy,
    Sell,
}

/// One row of the buy/sell ledger. Holdings are always derived from these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub id: Id,
    #[serde(default)]
    pub user_id: Id,
    #[serde(default)]
    pub account_id: Id,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub asset_class: AssetClass,
    pub ticker: String,
    #[serde(default)]
    pub ticker_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Currency the trade was settled in, e.g. "USD" or "TWD".
    pub currency: String,
    pub trade_date: NaiveDate,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(
        trade_type: TradeType,
        asset_class: AssetClass,
        ticker: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        currency: impl Into<String>,
        trade_date: NaiveDate,
    ) -> Self {
        Self {
            id: Id::new(),
            user_id: Id::default(),
            account_id: Id::default(),
            trade_type,
            asset_class,
            ticker: ticker.into(),
            ticker_name: String::new(),
            quantity,
            unit_price,
            currency: currency.into(),
            trade_date,
            created_at: Utc::now(),
        }
    }

    pub fn buy(
        asset_class: AssetClass,
        ticker: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        currency: impl Into<String>,
        trade_date: NaiveDate,
    ) -> Self {
        Self::new(
            TradeType::Buy,
            asset_class,
            ticker,
            quantity,
            unit_price,
            currency,
            trade_date,
        )
    }

    pub fn sell(
        asset_class: AssetClass,
        ticker: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        currency: impl Into<String>,
        trade_date: NaiveDate,
    ) -> Self {
        Self::new(
            TradeType::Sell,
            asset_class,
            ticker,
            quantity,
            unit_price,
            currency,
            trade_date,
        )
    }

    pub fn with_user(mut self, user_id: impl Into<Id>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_account(mut self, account_id: impl Into<Id>) -> Self {
        self.account_id = account_id.into();
        self
    }

    pub fn with_ticker_name(mut self, name: impl Into<String>) -> Self {
        self.ticker_name = name.into();
        self
    }
}
