mod memory;

pub use memory::MemoryStorage;

use anyhow::Result;
use chrono::NaiveDate;

use crate::models::{Account, Id, Trade};
use crate::portfolio::DailyValueSnapshot;

/// Source of the buy/sell ledger.
#[async_trait::async_trait]
pub trait TradeLedger: Send + Sync {
    /// All trades of one user, in insertion order.
    async fn list_trades(&self, user_id: &Id) -> Result<Vec<Trade>>;
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>>;
}

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// The user's preferred display currency, if they set one.
    async fn display_currency(&self, user_id: &Id) -> Result<Option<String>>;
}

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_user_ids(&self) -> Result<Vec<Id>>;
}

/// Persistence for daily net-worth snapshots. One row per (user, date);
/// writing the same day again replaces it.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn upsert_daily_value(&self, snapshot: &DailyValueSnapshot) -> Result<()>;

    /// Snapshots with `start <= date <= end`, oldest first.
    async fn list_daily_values(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyValueSnapshot>>;
}

/// Everything the portfolio services read and write.
pub trait Storage: TradeLedger + AccountStore + ProfileStore + UserDirectory + SnapshotStore {}

impl<T> Storage for T where T: TradeLedger + AccountStore + ProfileStore + UserDirectory + SnapshotStore
{}
