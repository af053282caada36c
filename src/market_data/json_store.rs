use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::Mutex;

use super::{CachedQuote, QuoteCacheStore};

/// Quote cache persisted as a single JSON object (`key -> entry`) on disk, so
/// cached prices survive restarts of the process.
///
/// Every mutation rewrites the whole file through a temporary sibling and a
/// rename. The in-process lock serializes readers and writers of one store.
pub struct JsonFileQuoteCacheStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileQuoteCacheStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, CachedQuote>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read quote cache {}", self.path.display())
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse quote cache {}", self.path.display()))
    }

    async fn write_all(&self, entries: &HashMap<String, CachedQuote>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create quote cache directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize quote cache")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuoteCacheStore for JsonFileQuoteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CachedQuote>> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        Ok(entries.remove(key))
    }

    async fn set(&self, key: &str, entry: &CachedQuote) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), entry.clone());
        self.write_all(&entries).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }

    async fn delete_if_expired(&self, key: &str, now: DateTime<Utc>) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if !entries.get(key).is_some_and(|entry| !entry.is_fresh(now)) {
            return Ok(false);
        }
        entries.remove(key);
        self.write_all(&entries).await?;
        Ok(true)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        let removed = before - entries.len();
        if removed > 0 {
            self.write_all(&entries).await?;
        }
        Ok(removed)
    }
}
