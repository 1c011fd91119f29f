//! Directory-backed key-value store.

use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::{KeyValueStore, StoreError};

/// [`KeyValueStore`] keeping one JSON file per key.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// mid-write leaves the previous value intact. The directory is created on
/// first write.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the store's files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.dir.join(format!("{}.json", encode_key(key)?)))
    }
}

/// Map a key to a portable file name. Bytes outside `[A-Za-z0-9._-]` are
/// written as `~XX`, which keeps the mapping injective.
fn encode_key(key: &str) -> Result<String, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }

    let mut name = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
            name.push(char::from(byte));
        } else {
            let _ = write!(name, "~{byte:02X}");
        }
    }
    Ok(name)
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let contents = serde_json::to_vec(&value)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(key, path = %path.display(), "Persisted value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("atelier:cart:items").unwrap(), "atelier~3Acart~3Aitems");
        assert_eq!(encode_key("plain-key_1.x").unwrap(), "plain-key_1.x");
        assert_ne!(encode_key("a:b").unwrap(), encode_key("a_b").unwrap());
        assert!(matches!(encode_key(""), Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested"));

        assert!(store.get("atelier:cart:items").await.unwrap().is_none());

        store
            .set("atelier:cart:items", json!({"version": 1, "items": []}))
            .await
            .unwrap();
        assert_eq!(
            store.get("atelier:cart:items").await.unwrap(),
            Some(json!({"version": 1, "items": []}))
        );

        store.remove("atelier:cart:items").await.unwrap();
        assert!(store.get("atelier:cart:items").await.unwrap().is_none());
        store.remove("atelier:cart:items").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        FileStore::new(dir.path()).set("flag", json!(false)).await.unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get("flag").await.unwrap(), Some(json!(false)));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        tokio::fs::write(dir.path().join("bad.json"), b"{not json")
            .await
            .unwrap();
        assert!(matches!(
            store.get("bad").await,
            Err(StoreError::Serialization(_))
        ));
    }
}
