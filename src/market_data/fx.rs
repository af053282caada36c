use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FxError;
use crate::models::normalize_currency_code;

/// Rates quoted against one base currency.
///
/// `rates[target]` is how many units of `target` one unit of `base` buys, so
/// an amount held in `target` is worth `amount / rate` in `base`. Currency
/// codes are normalized on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RateSetRecord")]
pub struct ExchangeRateSet {
    pub base: String,
    #[serde(default)]
    pub rates: HashMap<String, Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Wire shape of an [`ExchangeRateSet`], before code normalization.
#[derive(Deserialize)]
struct RateSetRecord {
    base: String,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<RateSetRecord> for ExchangeRateSet {
    fn from(record: RateSetRecord) -> Self {
        let mut set = record
            .rates
            .into_iter()
            .fold(ExchangeRateSet::new(&record.base), |set, (currency, rate)| {
                set.with_rate(&currency, rate)
            });
        set.updated_at = record.updated_at;
        set
    }
}

impl ExchangeRateSet {
    pub fn new(base: &str) -> Self {
        Self {
            base: normalize_currency_code(base),
            rates: HashMap::new(),
            updated_at: None,
        }
    }

    pub fn with_rate(mut self, currency: &str, rate: Decimal) -> Self {
        self.rates.insert(normalize_currency_code(currency), rate);
        self
    }

    /// Usable rate for `currency`. The base itself is always 1; zero or
    /// negative stored rates count as missing.
    pub fn rate(&self, currency: &str) -> Option<Decimal> {
        let currency = normalize_currency_code(currency);
        if currency == self.base {
            return Some(Decimal::ONE);
        }
        self.rates
            .get(&currency)
            .copied()
            .filter(|rate| *rate > Decimal::ZERO)
    }

    /// Express `amount` (held in `currency`) in the base currency.
    pub fn to_base(&self, amount: Decimal, currency: &str) -> Result<Decimal, FxError> {
        match self.rate(currency) {
            Some(rate) if rate == Decimal::ONE => Ok(amount),
            Some(rate) => amount
                .checked_div(rate)
                .ok_or_else(|| FxError::ConversionOverflow {
                    base: self.base.clone(),
                    currency: normalize_currency_code(currency),
                    amount,
                }),
            None => Err(FxError::RateUnavailable {
                base: self.base.clone(),
                currency: normalize_currency_code(currency),
            }),
        }
    }
}

/// Read side of the exchange-rate snapshot. Refreshing the snapshot is the
/// job of an external scheduler; lookups never hit the network.
#[async_trait::async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    async fn rates_for(&self, base: &str) -> Result<ExchangeRateSet>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRate {
    pub base: String,
    pub target: String,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// In-memory rate snapshot keyed by (base, target).
#[derive(Default)]
pub struct MemoryExchangeRateStore {
    rates: tokio::sync::Mutex<HashMap<(String, String), StoredRate>>,
}

impl MemoryExchangeRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace one pair. Called by the refresh job.
    pub async fn upsert_rate(
        &self,
        base: &str,
        target: &str,
        rate: Decimal,
        updated_at: DateTime<Utc>,
    ) {
        let base = normalize_currency_code(base);
        let target = normalize_currency_code(target);
        let mut rates = self.rates.lock().await;
        rates.insert(
            (base.clone(), target.clone()),
            StoredRate {
                base,
                target,
                rate,
                updated_at,
            },
        );
    }

    pub async fn load_set(&self, set: &ExchangeRateSet, updated_at: DateTime<Utc>) {
        for (target, rate) in &set.rates {
            self.upsert_rate(&set.base, target, *rate, updated_at).await;
        }
    }
}

#[async_trait::async_trait]
impl ExchangeRateProvider for MemoryExchangeRateStore {
    async fn rates_for(&self, base: &str) -> Result<ExchangeRateSet> {
        let base = normalize_currency_code(base);
        let rates = self.rates.lock().await;

        let mut set = ExchangeRateSet::new(&base);
        for stored in rates.values().filter(|r| r.base == base) {
            set.rates.insert(stored.target.clone(), stored.rate);
            set.updated_at = match set.updated_at {
                Some(existing) if existing >= stored.updated_at => Some(existing),
                _ => Some(stored.updated_at),
            };
        }
        Ok(set)
    }
}
