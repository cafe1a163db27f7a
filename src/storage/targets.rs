//! Monitored-target registry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;

use super::keys;
use super::models::MonitoredTarget;
use super::object::{decode, encode, ObjectStore};

#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn list(&self) -> Result<Vec<MonitoredTarget>, StorageError>;

    async fn get(&self, network: &str, client: &str) -> Result<Option<MonitoredTarget>, StorageError>;

    /// Insert or replace.
    async fn persist(&self, target: &MonitoredTarget) -> Result<(), StorageError>;

    /// Remove; `NotFound` when the target was never registered.
    async fn purge(&self, network: &str, client: &str) -> Result<(), StorageError>;
}

/// `TargetStore` over an object store.
pub struct TargetRepo {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl TargetRepo {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }
}

#[async_trait]
impl TargetStore for TargetRepo {
    async fn list(&self) -> Result<Vec<MonitoredTarget>, StorageError> {
        let found = self.store.list(&keys::networks_prefix(&self.prefix)).await?;
        let mut targets = Vec::new();
        for key in found.iter().filter(|k| keys::is_target_key(k)) {
            let body = self.store.get(key).await?;
            match decode(key, &body) {
                Ok(target) => targets.push(target),
                Err(e) => log::warn!("TARGET_SKIPPED key={} error={}", key, e),
            }
        }
        Ok(targets)
    }

    async fn get(&self, network: &str, client: &str) -> Result<Option<MonitoredTarget>, StorageError> {
        let key = keys::target_key(&self.prefix, network, client);
        match self.store.get(&key).await {
            Ok(body) => Ok(Some(decode(&key, &body)?)),
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn persist(&self, target: &MonitoredTarget) -> Result<(), StorageError> {
        let key = keys::target_key(&self.prefix, &target.network, &target.client);
        let body = encode(&key, target)?;
        self.store.put(&key, body).await?;
        log::debug!("TARGET_PERSISTED key={}", key);
        Ok(())
    }

    async fn purge(&self, network: &str, client: &str) -> Result<(), StorageError> {
        let key = keys::target_key(&self.prefix, network, client);
        self.store.delete(&key).await?;
        log::info!("TARGET_PURGED network={} client={}", network, client);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::clients::ClientType;
    use crate::storage::object::MemoryObjectStore;

    fn repo() -> (Arc<MemoryObjectStore>, TargetRepo) {
        let store = Arc::new(MemoryObjectStore::new());
        let repo = TargetRepo::new(store.clone(), "pulse");
        (store, repo)
    }

    #[tokio::test]
    async fn test_persist_get_list_purge() {
        let (store, repo) = repo();
        let nimbus = MonitoredTarget::new("devnet-7", "nimbus", ClientType::Consensus, "alerts");
        let geth = MonitoredTarget::new("devnet-8", "geth", ClientType::Execution, "alerts");
        repo.persist(&nimbus).await.unwrap();
        repo.persist(&geth).await.unwrap();

        // snapshots share the prefix but are not targets
        store
            .put("pulse/networks/devnet-7/hive_summary/results/2025-05-01.json", b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(repo.get("devnet-7", "nimbus").await.unwrap(), Some(nimbus.clone()));
        assert_eq!(repo.get("devnet-7", "geth").await.unwrap(), None);
        assert_eq!(repo.list().await.unwrap().len(), 2);

        repo.purge("devnet-7", "nimbus").await.unwrap();
        assert_eq!(repo.get("devnet-7", "nimbus").await.unwrap(), None);
        assert!(matches!(
            repo.purge("devnet-7", "nimbus").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_skips_undecodable_target() {
        let (store, repo) = repo();
        let geth = MonitoredTarget::new("devnet-8", "geth", ClientType::Execution, "alerts");
        repo.persist(&geth).await.unwrap();
        store
            .put("pulse/networks/devnet-7/checks/nimbus.json", b"{not json".to_vec())
            .await
            .unwrap();

        let listed = repo.list().await.unwrap();
        assert_eq!(listed, vec![geth]);
        assert!(matches!(
            repo.get("devnet-7", "nimbus").await,
            Err(StorageError::Codec { .. })
        ));
    }

    #[tokio::test]
    async fn test_persist_replaces() {
        let (_, repo) = repo();
        let mut target = MonitoredTarget::new("devnet-7", "nimbus", ClientType::Consensus, "alerts");
        repo.persist(&target).await.unwrap();
        target.channel = "other".to_string();
        repo.persist(&target).await.unwrap();

        let stored = repo.get("devnet-7", "nimbus").await.unwrap().unwrap();
        assert_eq!(stored.channel, "other");
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
