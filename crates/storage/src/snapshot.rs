//! Snapshot persistence
//!
//! This module provides the storage collaborator used to persist navigation
//! and flow state between launches: a [`SnapshotStore`] trait over opaque
//! blobs, an in-memory implementation, and a versioned, checksummed
//! envelope for the blobs themselves.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    /// Sled database error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corruption detected
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Version mismatch
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected version
        expected: u32,
        /// Found version
        found: u32,
    },
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Blob store keyed by string
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Save a blob, replacing any previous value
    async fn save(&self, key: &str, blob: Vec<u8>) -> Result<()>;

    /// Load a blob
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Remove a blob; returns whether it existed
    async fn remove(&self, key: &str) -> Result<bool>;
}

/// In-memory snapshot store (for tests and ephemeral sessions)
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, key: &str, blob: Vec<u8>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), blob);
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

/// Versioned snapshot envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope<T> {
    /// Schema version
    version: u32,
    /// Checksum for corruption detection
    checksum: String,
    /// The actual state data
    data: T,
}

fn checksum_of<T: Serialize>(data: &T) -> Result<String> {
    let data_json = serde_json::to_string(data)?;
    Ok(format!("{:x}", md5::compute(data_json)))
}

/// Wrap a value in a versioned, checksummed envelope
pub fn seal<T: Serialize>(version: u32, data: &T) -> Result<Vec<u8>> {
    let envelope = Envelope { version, checksum: checksum_of(data)?, data };
    Ok(serde_json::to_vec(&envelope)?)
}

/// Open an envelope, verifying checksum and version
pub fn open<T>(expected_version: u32, bytes: &[u8]) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let envelope: Envelope<T> = serde_json::from_slice(bytes)?;

    let computed = checksum_of(&envelope.data)?;
    if computed != envelope.checksum {
        return Err(StorageError::Corruption(format!(
            "Checksum mismatch: expected {}, got {}",
            envelope.checksum, computed
        )));
    }

    if envelope.version != expected_version {
        return Err(StorageError::VersionMismatch {
            expected: expected_version,
            found: envelope.version,
        });
    }

    Ok(envelope.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestState {
        counter: i32,
        name: String,
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemorySnapshotStore::new();
        assert!(store.is_empty().await);

        store.save("flow:onboarding", b"blob".to_vec()).await.unwrap();
        assert_eq!(store.load("flow:onboarding").await.unwrap(), Some(b"blob".to_vec()));
        assert_eq!(store.len().await, 1);

        assert!(store.remove("flow:onboarding").await.unwrap());
        assert!(!store.remove("flow:onboarding").await.unwrap());
        assert_eq!(store.load("flow:onboarding").await.unwrap(), None);
    }

    #[test]
    fn test_seal_and_open() {
        let state = TestState { counter: 42, name: "test".to_string() };
        let bytes = seal(1, &state).unwrap();
        let opened: TestState = open(1, &bytes).unwrap();
        assert_eq!(opened, state);
    }

    #[test]
    fn test_corruption_detection() {
        let state = TestState { counter: 42, name: "test".to_string() };
        let bytes = seal(1, &state).unwrap();
        let tampered = String::from_utf8(bytes).unwrap().replace("42", "99");

        let result: Result<TestState> = open(1, tampered.as_bytes());
        assert!(matches!(result, Err(StorageError::Corruption(_))));
    }

    #[test]
    fn test_version_mismatch() {
        let state = TestState { counter: 1, name: "v1".to_string() };
        let bytes = seal(1, &state).unwrap();

        let result: Result<TestState> = open(2, &bytes);
        assert!(matches!(result, Err(StorageError::VersionMismatch { expected: 2, found: 1 })));
    }

    #[test]
    fn test_garbage_is_serialization_error() {
        let result: Result<TestState> = open(1, b"not json");
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
