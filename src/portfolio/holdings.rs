use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::market_data::{ExchangeRateProvider, ExchangeRateSet, PriceSource};
use crate::models::{normalize_currency_code, Id, Trade};
use crate::storage::Storage;

use super::lots::{build_positions, Position};
use super::{AccountSummary, GroupKey, Holding};

/// Turns a trade ledger into valued holdings.
pub struct HoldingsAggregator {
    prices: Arc<dyn PriceSource>,
}

impl HoldingsAggregator {
    pub fn new(prices: Arc<dyn PriceSource>) -> Self {
        Self { prices }
    }

    /// Replay `trades` into open positions and value each one.
    ///
    /// One price lookup runs per open position, all concurrently. A failed
    /// lookup zeroes that holding's price and value; a ledger error fails the
    /// whole call before any price is requested.
    pub async fn aggregate(
        &self,
        trades: &[Trade],
        display_currency: &str,
        rates: &ExchangeRateSet,
    ) -> Result<HashMap<GroupKey, Holding>, LedgerError> {
        let positions = build_positions(trades)?;
        let display_currency = normalize_currency_code(display_currency);

        let lookups = positions
            .into_values()
            .map(|position| self.value_position(position, &display_currency, rates));
        let holdings = join_all(lookups).await;

        Ok(holdings.into_iter().map(|h| (h.key(), h)).collect())
    }

    async fn value_position(
        &self,
        position: Position,
        display_currency: &str,
        rates: &ExchangeRateSet,
    ) -> Holding {
        let key = position.key.clone();
        let mut ticker_name = position.ticker_name.clone();

        let quoted_price = match self.prices.price(key.asset_class, &key.ticker).await {
            Ok(quote) => {
                if ticker_name.is_empty() {
                    ticker_name = quote.name;
                }
                quote.price
            }
            Err(err) => {
                warn!(group = %key, error = %err, "price lookup failed; valuing holding at zero");
                Decimal::ZERO
            }
        };

        let quantity = position.quantity();
        let total_cost = position.total_cost();
        let (current_price, (total_value, gain_loss, gain_loss_percentage)) =
            match figures(quantity, total_cost, quoted_price) {
                Some(figures) => (quoted_price, figures),
                None => {
                    warn!(group = %key, price = %quoted_price, "quoted price out of range; valuing holding at zero");
                    let zeroed = figures(quantity, total_cost, Decimal::ZERO)
                        .unwrap_or((Decimal::ZERO, -total_cost, Decimal::ZERO));
                    (Decimal::ZERO, zeroed)
                }
            };

        let total_value_in_display_currency = if key.currency == display_currency {
            Some(total_value)
        } else {
            match rates.to_base(total_value, &key.currency) {
                Ok(converted) => Some(converted),
                Err(err) => {
                    warn!(group = %key, error = %err, "cannot convert to display currency; value omitted");
                    None
                }
            }
        };

        debug!(group = %key, quantity = %quantity, price = %current_price, "holding valued");

        Holding {
            ticker: key.ticker,
            ticker_name,
            asset_class: key.asset_class,
            currency: key.currency,
            quantity,
            average_cost: position.average_cost(),
            total_cost,
            current_price,
            total_value,
            total_value_in_display_currency,
            gain_loss,
            gain_loss_percentage,
        }
    }
}

/// Total value, gain/loss and gain/loss percentage at `price`, or `None`
/// when any of them leaves the decimal range.
fn figures(quantity: Decimal, total_cost: Decimal, price: Decimal) -> Option<(Decimal, Decimal, Decimal)> {
    let total_value = quantity.checked_mul(price)?;
    let gain_loss = total_value.checked_sub(total_cost)?;
    let gain_loss_percentage = if total_cost.is_zero() {
        Decimal::ZERO
    } else {
        gain_loss
            .checked_div(total_cost)?
            .checked_mul(Decimal::ONE_HUNDRED)?
    };
    Some((total_value, gain_loss, gain_loss_percentage))
}

/// Per-user holdings and account views over storage, prices and rates.
pub struct HoldingsService {
    storage: Arc<dyn Storage>,
    rates: Arc<dyn ExchangeRateProvider>,
    aggregator: HoldingsAggregator,
    default_currency: String,
}

impl HoldingsService {
    pub fn new(
        storage: Arc<dyn Storage>,
        prices: Arc<dyn PriceSource>,
        rates: Arc<dyn ExchangeRateProvider>,
    ) -> Self {
        Self {
            storage,
            rates,
            aggregator: HoldingsAggregator::new(prices),
            default_currency: "USD".to_string(),
        }
    }

    /// Currency used for users whose profile names none.
    pub fn with_default_currency(mut self, currency: &str) -> Self {
        self.default_currency = normalize_currency_code(currency);
        self
    }

    /// The user's profile currency, else the configured default.
    pub async fn display_currency(&self, user_id: &Id) -> Result<String> {
        let currency = self
            .storage
            .display_currency(user_id)
            .await
            .with_context(|| format!("Failed to load profile for user {user_id}"))?;

        match currency.map(|c| normalize_currency_code(&c)) {
            Some(c) if !c.is_empty() => Ok(c),
            _ => {
                debug!(user_id = %user_id, fallback = %self.default_currency, "no display currency set");
                Ok(self.default_currency.clone())
            }
        }
    }

    /// Valued holdings of one user, in no particular order.
    ///
    /// Failing to read the rate snapshot or replay the ledger fails the call;
    /// ledger errors stay downcastable to [`LedgerError`].
    pub async fn list_holdings(&self, user_id: &Id) -> Result<Vec<Holding>> {
        let display_currency = self.display_currency(user_id).await?;
        let rates = self
            .rates
            .rates_for(&display_currency)
            .await
            .with_context(|| format!("Failed to load exchange rates for {display_currency}"))?;
        let trades = self
            .storage
            .list_trades(user_id)
            .await
            .with_context(|| format!("Failed to load trades for user {user_id}"))?;

        let holdings = self
            .aggregator
            .aggregate(&trades, &display_currency, &rates)
            .await?;
        Ok(holdings.into_values().collect())
    }

    /// Account balances with their display-currency equivalent.
    pub async fn account_summaries(&self, user_id: &Id) -> Result<Vec<AccountSummary>> {
        let display_currency = self.display_currency(user_id).await?;
        let rates = self
            .rates
            .rates_for(&display_currency)
            .await
            .with_context(|| format!("Failed to load exchange rates for {display_currency}"))?;
        let accounts = self
            .storage
            .list_accounts(user_id)
            .await
            .with_context(|| format!("Failed to load accounts for user {user_id}"))?;

        Ok(accounts
            .into_iter()
            .map(|account| {
                let converted = rates.to_base(account.balance, &account.currency);
                if let Err(err) = &converted {
                    warn!(account_id = %account.id, error = %err, "no exchange rate for account balance");
                }
                AccountSummary {
                    account_id: account.id,
                    name: account.name,
                    currency: normalize_currency_code(&account.currency),
                    balance: account.balance,
                    balance_in_display_currency: converted.ok(),
                }
            })
            .collect())
    }
}
