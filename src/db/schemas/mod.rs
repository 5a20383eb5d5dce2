//! Database schemas for Manna

mod blob;

pub use blob::{BlobDoc, BLOB_COLLECTION};
