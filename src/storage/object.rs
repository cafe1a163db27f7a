//! Object storage abstraction.
//!
//! Repositories persist JSON documents under string keys. The concrete
//! backend (S3 or similar) is supplied by the embedding service.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local store, used in tests and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StorageError> {
        self.objects.write().insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .read()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

pub(crate) fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|source| StorageError::Codec {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, body: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(body).map_err(|source| StorageError::Codec {
        key: key.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_list_delete() {
        let store = MemoryObjectStore::new();
        store.put("a/1.json", b"1".to_vec()).await.unwrap();
        store.put("a/2.json", b"2".to_vec()).await.unwrap();
        store.put("b/1.json", b"3".to_vec()).await.unwrap();

        assert_eq!(store.get("a/2.json").await.unwrap(), b"2".to_vec());
        assert_eq!(store.list("a/").await.unwrap(), vec!["a/1.json", "a/2.json"]);

        store.delete("a/1.json").await.unwrap();
        assert!(matches!(
            store.get("a/1.json").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(store.delete("a/1.json").await.is_err());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_decode_error_names_key() {
        let err = decode::<Vec<u32>>("a/bad.json", b"{not json").unwrap_err();
        assert!(err.to_string().contains("a/bad.json"));
    }
}
