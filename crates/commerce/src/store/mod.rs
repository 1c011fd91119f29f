//! Persisted key-value store.
//!
//! The synchronizer needs a durable flat key → serialized value store with an
//! async get/set/remove contract. Two implementations ship here:
//!
//! - [`MemoryStore`] - process-lifetime store backed by `moka`, for tests and
//!   for platforms where persistence is provided elsewhere
//! - [`FileStore`] - one JSON file per key in a directory
//!
//! Values are `serde_json::Value`, so both plain strings and structured data
//! round-trip.

mod file;
pub(crate) mod persisted;

use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use thiserror::Error;

pub use file::FileStore;

/// Errors raised by a [`KeyValueStore`].
///
/// The synchronizer logs these and carries on; they never reach its callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem or platform storage failure.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The key cannot be represented by this store.
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Async durable key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory [`KeyValueStore`].
///
/// Clones share the same underlying map, so a second synchronizer built on a
/// clone sees everything the first one persisted.
#[derive(Clone)]
pub struct MemoryStore {
    cache: Cache<String, Value>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        // Unbounded and without TTL: entries live until removed.
        Self {
            cache: Cache::builder().build(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.cache.get(key).await)
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}
