//! MongoDB-backed blob store
//!
//! The connection is opened on first use and cached for the life of the
//! process. Reclamation is delegated to the server's TTL monitor.

use tracing::{debug, error, info};

use super::BlobStore;
use crate::blob::record::{BlobId, BlobRecord, NewBlob};
use crate::db::schemas::{BlobDoc, BLOB_COLLECTION};
use crate::db::{LazyConnection, MongoClient, MongoCollection};
use crate::types::{MannaError, Result};

pub struct MongoBlobStore {
    uri: String,
    db_name: String,
    blobs: LazyConnection<MongoCollection<BlobDoc>>,
}

impl MongoBlobStore {
    /// Does not touch the network; the first operation connects.
    pub fn new(uri: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            db_name: db_name.into(),
            blobs: LazyConnection::new(),
        }
    }

    /// Cached collection handle, connecting if this is the first use
    pub async fn handle(&self) -> Result<&MongoCollection<BlobDoc>> {
        self.blobs
            .get_or_connect(|| async {
                let client = MongoClient::new(&self.uri, &self.db_name).await?;
                let collection = client.collection::<BlobDoc>(BLOB_COLLECTION).await?;
                info!(
                    "Blob collection '{}' ready in '{}' (TTL index applied)",
                    BLOB_COLLECTION,
                    client.db_name()
                );
                Ok::<_, MannaError>(collection)
            })
            .await
            .inspect_err(|e| error!("MongoDB connection failed: {}", e))
    }
}

#[async_trait::async_trait]
impl BlobStore for MongoBlobStore {
    async fn connect(&self) -> Result<()> {
        self.handle().await.map(|_| ())
    }

    async fn create(&self, blob: NewBlob) -> Result<BlobId> {
        let collection = self.handle().await?;
        let oid = collection.insert_one(BlobDoc::from(blob)).await?;
        Ok(BlobId::from(oid))
    }

    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>> {
        let collection = self.handle().await?;
        let doc = collection.find_by_id(id.object_id()).await?;
        debug!(id = %id, found = doc.is_some(), "Blob lookup");
        Ok(doc.and_then(BlobDoc::into_record))
    }

    fn backend(&self) -> &'static str {
        "mongo"
    }
}
