//! Blob core: encoding rules, record model and the service tying them to a store

pub mod encoding;
pub mod record;
pub mod service;

pub use record::{BlobId, BlobRecord, BlobState, NewBlob, BLOB_TTL_SECS};
pub use service::{BlobService, Retrieved, SubmitRequest, Submitted, ValidationPolicy};
