//! Sled-backed snapshot store
//!
//! Snapshots survive restarts by living in a sled tree on disk. Keys are
//! namespaced (`snapshot:<key>`) so the same database can host other data.

use crate::snapshot::{Result, SnapshotStore};
use async_trait::async_trait;
use sled::Db;
use std::sync::Arc;

const NAMESPACE: &str = "snapshot";

/// Key-value store configuration
#[derive(Debug, Clone)]
pub struct KvConfig {
    /// Database path
    pub path: String,
    /// Cache capacity in bytes
    pub cache_capacity: u64,
    /// Enable compression
    pub use_compression: bool,
    /// Flush interval in milliseconds (None flushes on every save)
    pub flush_every_ms: Option<u64>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            path: "waypoint_snapshots.db".to_string(),
            cache_capacity: 8 * 1024 * 1024, // 8MB
            use_compression: true,
            flush_every_ms: Some(500),
        }
    }
}

impl KvConfig {
    /// Create a new configuration with a custom path
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Set cache capacity in bytes
    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = bytes;
        self
    }

    /// Enable or disable compression
    pub fn use_compression(mut self, enabled: bool) -> Self {
        self.use_compression = enabled;
        self
    }

    /// Set flush interval in milliseconds
    pub fn flush_every_ms(mut self, ms: Option<u64>) -> Self {
        self.flush_every_ms = ms;
        self
    }
}

/// Snapshot store backed by sled
#[derive(Clone)]
pub struct KvStore {
    db: Arc<Db>,
    flush_on_save: bool,
}

impl KvStore {
    /// Open (or create) a store with configuration
    pub fn new(config: KvConfig) -> Result<Self> {
        let db_config = sled::Config::new()
            .path(&config.path)
            .cache_capacity(config.cache_capacity)
            .use_compression(config.use_compression)
            .flush_every_ms(config.flush_every_ms);

        let db = db_config.open()?;
        tracing::debug!(path = %config.path, "Opened snapshot store");

        Ok(Self { db: Arc::new(db), flush_on_save: config.flush_every_ms.is_none() })
    }

    /// Create a temporary store (for testing)
    pub fn in_memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db: Arc::new(db), flush_on_save: false })
    }

    fn scoped(key: &str) -> String {
        format!("{}:{}", NAMESPACE, key)
    }

    /// Keys of every stored snapshot
    pub fn keys(&self) -> Result<Vec<String>> {
        let prefix = format!("{}:", NAMESPACE);
        let mut keys = Vec::new();

        for item in self.db.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            if let Ok(key_str) = String::from_utf8(key.to_vec()) {
                keys.push(key_str[prefix.len()..].to_string());
            }
        }

        Ok(keys)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Remove every snapshot
    pub fn clear(&self) -> Result<()> {
        for key in self.keys()? {
            self.db.remove(Self::scoped(&key).as_bytes())?;
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for KvStore {
    async fn save(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        self.db.insert(Self::scoped(key).as_bytes(), blob)?;
        if self.flush_on_save {
            self.db.flush_async().await?;
        }
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(Self::scoped(key).as_bytes())?.map(|v| v.to_vec()))
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.db.remove(Self::scoped(key).as_bytes())?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let store = KvStore::in_memory().unwrap();
        store.save("flow:onboarding", b"{}".to_vec()).await.unwrap();
        assert_eq!(store.load("flow:onboarding").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(store.load("flow:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_remove_and_keys() {
        let store = KvStore::in_memory().unwrap();
        store.save("a", vec![1]).await.unwrap();
        store.save("b", vec![2]).await.unwrap();

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        assert!(store.remove("a").await.unwrap());
        assert!(!store.remove("a").await.unwrap());

        store.clear().unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("snapshots.db");
        let config = KvConfig::new(path.to_string_lossy().to_string()).flush_every_ms(None);

        {
            let store = KvStore::new(config.clone()).unwrap();
            store.save("flow:setup", b"state".to_vec()).await.unwrap();
        }

        let store = KvStore::new(config).unwrap();
        assert_eq!(store.load("flow:setup").await.unwrap(), Some(b"state".to_vec()));
    }
}
