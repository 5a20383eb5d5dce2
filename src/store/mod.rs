//! Blob store adapters
//!
//! The service talks to a `BlobStore`; backends own their own connection
//! lifecycle and physical TTL reclamation. Logical expiry is the reader's
//! job, so `find_by_id` may return records that are already past their
//! deadline.

mod memory;
mod mongo;

pub use memory::{spawn_sweep_task, MemoryBlobStore};
pub use mongo::MongoBlobStore;

use crate::blob::record::{BlobId, BlobRecord, NewBlob};
use crate::types::Result;

/// Persistence contract for blob records
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Establish (or reuse) the backend connection
    async fn connect(&self) -> Result<()>;

    /// Persist a record; the store assigns the identifier
    async fn create(&self, blob: NewBlob) -> Result<BlobId>;

    /// Fetch a record. Unknown and reclaimed ids both come back as `None`.
    async fn find_by_id(&self, id: &BlobId) -> Result<Option<BlobRecord>>;

    /// Backend name for logs and health output
    fn backend(&self) -> &'static str;
}
