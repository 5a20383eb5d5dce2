//! In-memory blob store
//!
//! Same contract as the MongoDB backend: identifiers are assigned on create,
//! and a background sweep stands in for the server's TTL monitor. Used in
//! development and tests.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::BlobStore;
use crate::blob::record::{BlobId, BlobRecord, NewBlob};
use crate::types::Result;

#[derive(Default)]
pub struct MemoryBlobStore {
    records: DashMap<BlobId, BlobRecord>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physically delete every record past its deadline.
    ///
    /// Returns the number of records reclaimed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_live_at(now));
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, blob: NewBlob) -> Result<BlobId> {
        let id = BlobId::generate();
        self.records.insert(id, blob.into_record(id));
        Ok(id)
    }

    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Periodically reclaim expired records
pub fn spawn_sweep_task(store: Arc<MemoryBlobStore>, interval: Duration) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = store.sweep_expired(Utc::now());
            if removed > 0 {
                debug!("Blob sweep: reclaimed {} expired records", removed);
            }
        }
    });
    info!("Memory store sweep task started (every {}s)", interval.as_secs());
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::record::blob_ttl;
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    fn blob_at(created_at: DateTime<Utc>) -> NewBlob {
        NewBlob::new(
            "data:image/png;base64,iVBORw0KGgo=".into(),
            "image/png".into(),
            created_at,
        )
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let store = MemoryBlobStore::new();
        let created = Utc::now();
        let id = assert_ok!(store.create(blob_at(created)).await);

        let record = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.content_type, "image/png");
        assert_eq!(record.created_at, created);
    }

    #[tokio::test]
    async fn test_unknown_id_is_absent() {
        let store = MemoryBlobStore::new();
        let missing = BlobId::generate();
        assert!(store.find_by_id(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_reclaims_only_expired() {
        let store = MemoryBlobStore::new();
        let t = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();

        let old = store.create(blob_at(t)).await.unwrap();
        let fresh = store.create(blob_at(t + chrono::Duration::hours(3))).await.unwrap();

        assert_eq!(store.sweep_expired(t + chrono::Duration::hours(1)), 0);
        assert_eq!(store.sweep_expired(t + blob_ttl()), 1);

        // Reclaimed and never-created look the same to callers
        assert!(store.find_by_id(&old).await.unwrap().is_none());
        assert!(store.find_by_id(&fresh).await.unwrap().is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_task_runs() {
        let store = Arc::new(MemoryBlobStore::new());
        let long_ago = Utc::now() - chrono::Duration::hours(6);
        store.create(blob_at(long_ago)).await.unwrap();

        let task = spawn_sweep_task(Arc::clone(&store), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();

        assert!(store.is_empty());
    }
}
