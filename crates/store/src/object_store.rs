//! The object storage seam and its in-memory test double.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::StoreError;

/// Minimal blob-store surface the pipeline needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under a key, overwriting any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Fetch an object's bytes. [`StoreError::NotFound`] when absent.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object synchronously during test setup.
    pub fn seed(&mut self, key: &str, bytes: Vec<u8>) {
        self.objects.get_mut().insert(key.to_string(), bytes);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StoreError> {
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.objects.read().await.contains_key(key))
    }
}
