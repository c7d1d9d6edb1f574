//! Key/value store implementations

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::PlatformError;
use crate::KeyValueStore;

/// Durable store backed by a sled database
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) a database at `path`
    pub fn open(path: &Path) -> Result<Self, PlatformError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(path)?;
        debug!("Opened state store at {}", path.display());
        Ok(Self { db })
    }
}

#[async_trait]
impl KeyValueStore for SledStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
        self.db.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }
}

/// Volatile in-process store
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PlatformError> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), PlatformError> {
        self.values.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
