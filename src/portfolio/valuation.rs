use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::market_data::{ExchangeRateProvider, ExchangeRateSet};
use crate::models::{normalize_currency_code, Account, Id};
use crate::storage::Storage;

use super::{
    DailyValueSnapshot, Holding, HoldingsService, SkippedItem, TotalValuation, ValuationLineItem,
};

/// Fold holdings and account balances into one total in `rates.base`.
/// Amounts whose currency has no usable rate are left out and listed in
/// `skipped`.
pub fn fold_total(
    user_id: &Id,
    holdings: &[Holding],
    accounts: &[Account],
    rates: &ExchangeRateSet,
    as_of: DateTime<Utc>,
) -> TotalValuation {
    let mut line_items = Vec::with_capacity(holdings.len() + accounts.len());
    let mut skipped = Vec::new();

    let mut holdings: Vec<&Holding> = holdings.iter().collect();
    holdings.sort_by_key(|h| h.key());

    for holding in holdings {
        let key = holding.key().to_string();
        match rates.to_base(holding.total_value, &holding.currency) {
            Ok(converted) => line_items.push(ValuationLineItem::Holding {
                key,
                amount: holding.total_value,
                currency: holding.currency.clone(),
                converted,
            }),
            Err(err) => {
                warn!(user_id = %user_id, holding = %key, error = %err, "skipping holding that cannot be converted");
                skipped.push(SkippedItem {
                    label: key,
                    amount: holding.total_value,
                    currency: holding.currency.clone(),
                });
            }
        }
    }

    for account in accounts {
        let currency = normalize_currency_code(&account.currency);
        match rates.to_base(account.balance, &currency) {
            Ok(converted) => line_items.push(ValuationLineItem::Account {
                account_id: account.id.clone(),
                name: account.name.clone(),
                amount: account.balance,
                currency,
                converted,
            }),
            Err(err) => {
                warn!(user_id = %user_id, account_id = %account.id, error = %err, "skipping account that cannot be converted");
                skipped.push(SkippedItem {
                    label: account.name.clone(),
                    amount: account.balance,
                    currency,
                });
            }
        }
    }

    let mut total_value = Decimal::ZERO;
    let mut counted = Vec::with_capacity(line_items.len());
    for item in line_items {
        match total_value.checked_add(item.converted()) {
            Some(sum) => {
                total_value = sum;
                counted.push(item);
            }
            None => {
                warn!(user_id = %user_id, converted = %item.converted(), "skipping item that overflows the total");
                skipped.push(item.into_skipped());
            }
        }
    }
    let line_items = counted;

    TotalValuation {
        user_id: user_id.clone(),
        currency: rates.base.clone(),
        total_value,
        line_items,
        skipped,
        as_of,
    }
}

/// Net worth per user and the daily snapshot job built on it.
pub struct TotalValuationService {
    storage: Arc<dyn Storage>,
    holdings: Arc<HoldingsService>,
    rates: Arc<dyn ExchangeRateProvider>,
    clock: Arc<dyn Clock>,
}

impl TotalValuationService {
    pub fn new(
        storage: Arc<dyn Storage>,
        holdings: Arc<HoldingsService>,
        rates: Arc<dyn ExchangeRateProvider>,
    ) -> Self {
        Self {
            storage,
            holdings,
            rates,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current total of holdings plus account balances in the user's display
    /// currency.
    pub async fn valuate_user(&self, user_id: &Id) -> Result<TotalValuation> {
        let currency = self.holdings.display_currency(user_id).await?;
        let holdings = self.holdings.list_holdings(user_id).await?;
        let accounts = self
            .storage
            .list_accounts(user_id)
            .await
            .with_context(|| format!("Failed to load accounts for user {user_id}"))?;
        let rates = self
            .rates
            .rates_for(&currency)
            .await
            .with_context(|| format!("Failed to load exchange rates for {currency}"))?;

        Ok(fold_total(
            user_id,
            &holdings,
            &accounts,
            &rates,
            self.clock.now(),
        ))
    }

    /// Write one snapshot per user for `date`. Users that fail are logged and
    /// skipped. Returns how many snapshots were written.
    pub async fn record_daily_snapshots(&self, date: NaiveDate) -> Result<usize> {
        let user_ids = self
            .storage
            .list_user_ids()
            .await
            .context("Failed to list users")?;

        let mut recorded = 0;
        for user_id in &user_ids {
            match self.record_user_snapshot(user_id, date).await {
                Ok(snapshot) => {
                    info!(
                        user_id = %user_id,
                        date = %date,
                        total_value = %snapshot.total_value,
                        currency = %snapshot.currency,
                        "recorded daily value"
                    );
                    recorded += 1;
                }
                Err(err) => {
                    warn!(user_id = %user_id, date = %date, error = %err, "failed to record daily value");
                }
            }
        }

        info!(date = %date, recorded, users = user_ids.len(), "daily value snapshot run finished");
        Ok(recorded)
    }

    /// Snapshot run dated by the injected clock.
    pub async fn record_today(&self) -> Result<usize> {
        self.record_daily_snapshots(self.clock.today()).await
    }

    async fn record_user_snapshot(&self, user_id: &Id, date: NaiveDate) -> Result<DailyValueSnapshot> {
        let valuation = self.valuate_user(user_id).await?;
        let snapshot = DailyValueSnapshot {
            user_id: user_id.clone(),
            date,
            total_value: valuation.total_value,
            currency: valuation.currency,
        };
        self.storage
            .upsert_daily_value(&snapshot)
            .await
            .with_context(|| format!("Failed to store daily value for user {user_id}"))?;
        Ok(snapshot)
    }

    pub async fn daily_values(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyValueSnapshot>> {
        self.storage
            .list_daily_values(user_id, start, end)
            .await
            .with_context(|| format!("Failed to load daily values for user {user_id}"))
    }
}
