//! In-memory storage implementation for testing and one-shot CLI runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use crate::models::{normalize_currency_code, Account, Id, Trade};
use crate::portfolio::DailyValueSnapshot;

use super::{AccountStore, ProfileStore, SnapshotStore, TradeLedger, UserDirectory};

/// In-memory storage. Users are known once they have a profile, a trade or
/// an account.
pub struct MemoryStorage {
    users: Mutex<BTreeSet<Id>>,
    display_currencies: Mutex<HashMap<Id, String>>,
    trades: Mutex<HashMap<Id, Vec<Trade>>>,
    accounts: Mutex<HashMap<Id, Vec<Account>>>,
    snapshots: Mutex<BTreeMap<(Id, NaiveDate), DailyValueSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(BTreeSet::new()),
            display_currencies: Mutex::new(HashMap::new()),
            trades: Mutex::new(HashMap::new()),
            accounts: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn add_user(&self, user_id: &Id) {
        self.users.lock().await.insert(user_id.clone());
    }

    pub async fn set_display_currency(&self, user_id: &Id, currency: &str) {
        self.add_user(user_id).await;
        let mut currencies = self.display_currencies.lock().await;
        currencies.insert(user_id.clone(), normalize_currency_code(currency));
    }

    pub async fn append_trades(&self, new_trades: &[Trade]) {
        for trade in new_trades {
            self.add_user(&trade.user_id).await;
        }
        let mut trades = self.trades.lock().await;
        for trade in new_trades {
            trades
                .entry(trade.user_id.clone())
                .or_default()
                .push(trade.clone());
        }
    }

    /// Insert or replace an account (matched by id).
    pub async fn save_account(&self, account: &Account) {
        self.add_user(&account.user_id).await;
        let mut accounts = self.accounts.lock().await;
        let owned = accounts.entry(account.user_id.clone()).or_default();
        match owned.iter_mut().find(|a| a.id == account.id) {
            Some(existing) => *existing = account.clone(),
            None => owned.push(account.clone()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TradeLedger for MemoryStorage {
    async fn list_trades(&self, user_id: &Id) -> Result<Vec<Trade>> {
        let trades = self.trades.lock().await;
        Ok(trades.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStorage {
    async fn list_accounts(&self, user_id: &Id) -> Result<Vec<Account>> {
        let accounts = self.accounts.lock().await;
        Ok(accounts.get(user_id).cloned().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryStorage {
    async fn display_currency(&self, user_id: &Id) -> Result<Option<String>> {
        let currencies = self.display_currencies.lock().await;
        Ok(currencies.get(user_id).cloned())
    }
}

#[async_trait::async_trait]
impl UserDirectory for MemoryStorage {
    async fn list_user_ids(&self) -> Result<Vec<Id>> {
        let users = self.users.lock().await;
        Ok(users.iter().cloned().collect())
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemoryStorage {
    async fn upsert_daily_value(&self, snapshot: &DailyValueSnapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(
            (snapshot.user_id.clone(), snapshot.date),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn list_daily_values(
        &self,
        user_id: &Id,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyValueSnapshot>> {
        if start > end {
            return Ok(Vec::new());
        }
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots
            .range((user_id.clone(), start)..=(user_id.clone(), end))
            .map(|(_, snapshot)| snapshot.clone())
            .collect())
    }
}
