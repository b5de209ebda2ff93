//! Cache store abstraction: the key-value collaborator behind the
//! comparison cache.
//!
//! Values are opaque strings (the comparison cache stores JSON). Every
//! operation may fail; callers on the comparison path treat failures as
//! misses rather than errors.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`get`](CacheStore::get) | Read a live value |
//! | [`set`](CacheStore::set) | Write a value with a TTL measured from now |
//! | [`delete`](CacheStore::delete) | Remove specific keys |
//! | [`delete_prefix`](CacheStore::delete_prefix) | Remove every key under a prefix |
//! | [`clear`](CacheStore::clear) | Remove everything (shutdown flush) |

pub mod memory;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Returns the number of keys removed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Returns the number of keys removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    async fn clear(&self) -> Result<()>;
}
