use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::CachedQuote;

/// Persistence for cached quotes. Writes are idempotent upserts; concurrent
/// writers for one key are last-write-wins.
#[async_trait::async_trait]
pub trait QuoteCacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedQuote>>;

    async fn set(&self, key: &str, entry: &CachedQuote) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove `key` only if the stored entry has expired at `now`, so a fresh
    /// entry written concurrently is kept. Returns whether anything was removed.
    async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool>;

    /// Remove every entry whose expiry is at or before `now`. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Default)]
pub struct MemoryQuoteCacheStore {
    entries: tokio::sync::Mutex<HashMap<String, CachedQuote>>,
}

impl MemoryQuoteCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl QuoteCacheStore for MemoryQuoteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CachedQuote>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, entry: &CachedQuote) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| !entry.is_fresh(now)) {
            entries.remove(key);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        Ok(before - entries.len())
    }
}
