//! FIFO cost-basis tracking.
//!
//! Trades are grouped by [`GroupKey`], ordered by trade date (ties keep ledger
//! order) and replayed against a queue of lots. A sell consumes the oldest
//! lots first and removes exactly the cost of what it consumed, so after any
//! sell `total_cost / quantity` is the weighted cost of the remaining lots.

use std::collections::{BTreeMap, VecDeque};

use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::models::{Trade, TradeType};

use super::{GroupKey, Lot};

/// Running state of one group while the ledger is replayed.
#[derive(Debug, Clone)]
pub struct Position {
    pub key: GroupKey,
    pub ticker_name: String,
    lots: VecDeque<Lot>,
    quantity: Decimal,
    total_cost: Decimal,
    average_cost: Decimal,
}

impl Position {
    pub fn new(key: GroupKey) -> Self {
        Self {
            key,
            ticker_name: String::new(),
            lots: VecDeque::new(),
            quantity: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            average_cost: Decimal::ZERO,
        }
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn total_cost(&self) -> Decimal {
        self.total_cost
    }

    pub fn average_cost(&self) -> Decimal {
        self.average_cost
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }

    /// Apply one trade. `sequence` is the trade's ledger position. On error
    /// the position is left untouched.
    pub fn apply(&mut self, trade: &Trade, sequence: usize) -> Result<(), LedgerError> {
        if trade.quantity <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveQuantity {
                group: self.key.clone(),
                trade_id: trade.id.clone(),
                quantity: trade.quantity,
            });
        }
        if trade.unit_price < Decimal::ZERO {
            return Err(LedgerError::NegativeUnitPrice {
                group: self.key.clone(),
                trade_id: trade.id.clone(),
                unit_price: trade.unit_price,
            });
        }

        let overflow = || LedgerError::Overflow {
            group: self.key.clone(),
            trade_id: trade.id.clone(),
        };
        let next = match trade.trade_type {
            TradeType::Buy => self.plan_buy(trade.quantity, trade.unit_price),
            TradeType::Sell => self.plan_sell(trade.quantity)?,
        }
        .ok_or_else(overflow)?;

        match trade.trade_type {
            TradeType::Buy => self.lots.push_back(Lot {
                quantity: trade.quantity,
                unit_cost: trade.unit_price,
                sequence,
            }),
            TradeType::Sell => {
                for _ in 0..next.closed_lots {
                    self.lots.pop_front();
                }
                if let (Some(lot), Some(left)) = (self.lots.front_mut(), next.front_remaining) {
                    lot.quantity = left;
                }
            }
        }
        self.commit(next);

        if self.ticker_name.is_empty() && !trade.ticker_name.trim().is_empty() {
            self.ticker_name = trade.ticker_name.trim().to_string();
        }
        Ok(())
    }

    /// Totals after a buy, or `None` if they leave the decimal range.
    fn plan_buy(&self, quantity: Decimal, unit_cost: Decimal) -> Option<Settled> {
        let cost = quantity.checked_mul(unit_cost)?;
        Settled::new(
            self.quantity.checked_add(quantity)?,
            self.total_cost.checked_add(cost)?,
        )
    }

    /// Lot consumption for a sell, computed without touching the queue.
    fn plan_sell(&self, requested: Decimal) -> Result<Option<Settled>, LedgerError> {
        if requested > self.quantity {
            return Err(LedgerError::InsufficientHolding {
                group: self.key.clone(),
                requested,
                available: self.quantity,
                shortfall: requested - self.quantity,
            });
        }

        let mut remaining = requested;
        let mut released = Decimal::ZERO;
        let mut closed_lots = 0;
        let mut front_remaining = None;
        for lot in &self.lots {
            if remaining <= Decimal::ZERO {
                break;
            }
            let matched = lot.quantity.min(remaining);
            let Some(cost) = matched
                .checked_mul(lot.unit_cost)
                .and_then(|cost| released.checked_add(cost))
            else {
                return Ok(None);
            };
            released = cost;
            remaining -= matched;
            if matched < lot.quantity {
                front_remaining = Some(lot.quantity - matched);
            } else {
                closed_lots += 1;
            }
        }

        let Some(total_cost) = self.total_cost.checked_sub(released) else {
            return Ok(None);
        };
        Ok(Settled::new(self.quantity - requested, total_cost).map(|settled| Settled {
            closed_lots,
            front_remaining,
            ..settled
        }))
    }

    fn commit(&mut self, next: Settled) {
        if next.quantity > Decimal::ZERO {
            self.quantity = next.quantity;
            self.total_cost = next.total_cost;
            self.average_cost = next.average_cost;
        } else {
            self.lots.clear();
            self.quantity = Decimal::ZERO;
            self.total_cost = Decimal::ZERO;
            self.average_cost = Decimal::ZERO;
        }
    }
}

/// Totals of a position after one trade, before they are committed.
struct Settled {
    quantity: Decimal,
    total_cost: Decimal,
    average_cost: Decimal,
    closed_lots: usize,
    front_remaining: Option<Decimal>,
}

impl Settled {
    fn new(quantity: Decimal, total_cost: Decimal) -> Option<Self> {
        let average_cost = if quantity > Decimal::ZERO {
            total_cost.checked_div(quantity)?
        } else {
            Decimal::ZERO
        };
        Some(Self {
            quantity,
            total_cost,
            average_cost,
            closed_lots: 0,
            front_remaining: None,
        })
    }
}

/// Replay a ledger into open positions. Groups whose final quantity is zero
/// are dropped. Any invalid trade or oversell aborts the whole replay.
pub fn build_positions(trades: &[Trade]) -> Result<BTreeMap<GroupKey, Position>, LedgerError> {
    let mut grouped: BTreeMap<GroupKey, Vec<(usize, &Trade)>> = BTreeMap::new();
    for (sequence, trade) in trades.iter().enumerate() {
        grouped
            .entry(GroupKey::for_trade(trade))
            .or_default()
            .push((sequence, trade));
    }

    let mut positions = BTreeMap::new();
    for (key, mut group) in grouped {
        // stable: same-day trades keep ledger order
        group.sort_by_key(|(_, trade)| trade.trade_date);

        let mut position = Position::new(key.clone());
        for (sequence, trade) in group {
            position.apply(trade, sequence)?;
        }
        if position.quantity() > Decimal::ZERO {
            positions.insert(key, position);
        }
    }
    Ok(positions)
}
