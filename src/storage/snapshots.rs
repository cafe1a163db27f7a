//! Historical snapshot store.
//!
//! One snapshot per network per day; a later write on the same day
//! replaces the earlier one.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{SnapshotError, StorageError};
use crate::regression::summary::SummaryResult;

use super::keys;
use super::object::{decode, encode, ObjectStore};

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn store_result(&self, summary: &SummaryResult) -> Result<(), StorageError>;

    /// The second-most-recent snapshot of `network`.
    ///
    /// `InsufficientHistory` when fewer than two snapshots exist.
    async fn get_previous(&self, network: &str) -> Result<SummaryResult, SnapshotError>;
}

/// `SnapshotStore` over an object store.
pub struct SnapshotRepo {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl SnapshotRepo {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: &str) -> Self {
        Self {
            store,
            prefix: prefix.to_string(),
        }
    }

    /// Snapshot dates for `network`, newest first. Keys without a valid
    /// date are ignored.
    pub async fn dates(&self, network: &str) -> Result<Vec<NaiveDate>, StorageError> {
        let found = self.store.list(&keys::snapshot_prefix(&self.prefix, network)).await?;
        let mut dates: Vec<NaiveDate> = found.iter().filter_map(|k| keys::snapshot_date(k)).collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }
}

#[async_trait]
impl SnapshotStore for SnapshotRepo {
    async fn store_result(&self, summary: &SummaryResult) -> Result<(), StorageError> {
        let key = keys::snapshot_key(&self.prefix, &summary.network, &summary.date_key());
        let body = encode(&key, summary)?;
        self.store.put(&key, body).await?;
        log::info!(
            "SNAPSHOT_STORED network={} key={} clients={}",
            summary.network,
            key,
            summary.client_results.len()
        );
        Ok(())
    }

    async fn get_previous(&self, network: &str) -> Result<SummaryResult, SnapshotError> {
        let dates = self.dates(network).await?;
        let Some(previous) = dates.get(1) else {
            return Err(SnapshotError::InsufficientHistory {
                network: network.to_string(),
                found: dates.len(),
            });
        };

        let key = keys::snapshot_key(&self.prefix, network, &previous.format("%Y-%m-%d").to_string());
        let body = self.store.get(&key).await?;
        Ok(decode(&key, &body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::summary::build_summary;
    use crate::regression::summary::tests::result;
    use crate::storage::object::MemoryObjectStore;

    fn repo() -> SnapshotRepo {
        SnapshotRepo::new(Arc::new(MemoryObjectStore::new()), "pulse")
    }

    fn snapshot(fails: u64, day: u32) -> SummaryResult {
        build_summary("devnet-7", &[result("geth", "consensus", 10, fails, day)]).unwrap()
    }

    #[tokio::test]
    async fn test_cold_start_is_insufficient_history() {
        let repo = repo();
        assert!(matches!(
            repo.get_previous("devnet-7").await,
            Err(SnapshotError::InsufficientHistory { found: 0, .. })
        ));

        repo.store_result(&snapshot(1, 1)).await.unwrap();
        assert!(matches!(
            repo.get_previous("devnet-7").await,
            Err(SnapshotError::InsufficientHistory { found: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_previous_is_second_most_recent() {
        let repo = repo();
        repo.store_result(&snapshot(1, 1)).await.unwrap();
        repo.store_result(&snapshot(2, 3)).await.unwrap();
        repo.store_result(&snapshot(3, 2)).await.unwrap();

        let previous = repo.get_previous("devnet-7").await.unwrap();
        assert_eq!(previous.date_key(), "2025-05-02");
        assert_eq!(previous.total_fails, 3);
    }

    #[tokio::test]
    async fn test_same_day_write_replaces() {
        let repo = repo();
        repo.store_result(&snapshot(1, 1)).await.unwrap();
        repo.store_result(&snapshot(4, 1)).await.unwrap();
        assert_eq!(repo.dates("devnet-7").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_networks_are_isolated() {
        let repo = repo();
        repo.store_result(&snapshot(1, 1)).await.unwrap();
        repo.store_result(&snapshot(2, 2)).await.unwrap();
        assert!(matches!(
            repo.get_previous("devnet-8").await,
            Err(SnapshotError::InsufficientHistory { found: 0, .. })
        ));
    }
}
