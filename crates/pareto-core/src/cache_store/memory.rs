//! In-memory [`CacheStore`] with per-entry TTL.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Expired entries are skipped
//! on read and dropped lazily on write or by [`InMemoryCacheStore::purge_expired`].

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::CacheStore;

struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Drops every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, e| e.expires_at > now);
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("cache store lock poisoned")
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at > Utc::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl).context("cache TTL out of range")?;
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
