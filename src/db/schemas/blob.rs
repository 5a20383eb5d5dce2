//! Blob document schema
//!
//! Field names match the `images` collection written by earlier deployments,
//! so existing TTL indexes and documents stay usable.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::blob::record::{BlobId, BlobRecord, NewBlob, BLOB_TTL_SECS};
use crate::db::mongo::IntoIndexes;

/// Collection name for blobs
pub const BLOB_COLLECTION: &str = "images";

/// Blob document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BlobDoc {
    /// MongoDB document ID, assigned on insert
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Data URL as submitted
    pub data: String,

    #[serde(rename = "mimeType")]
    pub mime_type: String,

    /// Drives the TTL index
    #[serde(rename = "createdAt")]
    pub created_at: DateTime,
}

impl From<NewBlob> for BlobDoc {
    fn from(blob: NewBlob) -> Self {
        Self {
            _id: None,
            data: blob.payload,
            mime_type: blob.content_type,
            created_at: DateTime::from_chrono(blob.created_at),
        }
    }
}

impl BlobDoc {
    /// Convert a fetched document into a record; documents without `_id` are skipped
    pub fn into_record(self) -> Option<BlobRecord> {
        let id = self._id?;
        Some(BlobRecord {
            id: BlobId::from(id),
            payload: self.data,
            content_type: self.mime_type,
            created_at: self.created_at.to_chrono(),
        })
    }
}

impl IntoIndexes for BlobDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // TTL index: the server deletes documents 5h after createdAt.
            // Left unnamed so it matches the default `createdAt_1`.
            (
                doc! { "createdAt": 1 },
                Some(
                    IndexOptions::builder()
                        .expire_after(Duration::from_secs(BLOB_TTL_SECS as u64))
                        .build(),
                ),
            ),
        ]
    }
}
