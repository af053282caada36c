use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Id;

/// A cash or brokerage account. Only the flat balance takes part in valuation;
/// positions held in the account come from the trade ledger instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub currency: String,
    pub balance: Decimal,
}

impl Account {
    pub fn new(
        user_id: impl Into<Id>,
        name: impl Into<String>,
        currency: impl Into<String>,
        balance: Decimal,
    ) -> Self {
        Self {
            id: Id::new(),
            user_id: user_id.into(),
            name: name.into(),
            currency: currency.into(),
            balance,
        }
    }
}
