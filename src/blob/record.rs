//! Blob record model
//!
//! Records are write-once. Expiry is derived from `created_at` and the fixed
//! system-wide TTL; it is never stored per record.

use bson::oid::ObjectId;
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

use crate::types::MannaError;

/// Lifetime of every blob, in seconds (5 hours)
pub const BLOB_TTL_SECS: i64 = 18_000;

/// Lifetime of every blob
pub fn blob_ttl() -> Duration {
    Duration::seconds(BLOB_TTL_SECS)
}

/// Opaque blob identifier, assigned by the store on creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(ObjectId);

impl BlobId {
    /// Mint a fresh identifier (store backends only)
    pub(crate) fn generate() -> Self {
        Self(ObjectId::new())
    }

    pub fn object_id(&self) -> ObjectId {
        self.0
    }
}

impl From<ObjectId> for BlobId {
    fn from(oid: ObjectId) -> Self {
        Self(oid)
    }
}

impl FromStr for BlobId {
    type Err = MannaError;

    /// Anything that is not a store identifier cannot name a blob
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ObjectId::parse_str(s.trim())
            .map(Self)
            .map_err(|_| MannaError::NotFound)
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// A validated blob waiting to be persisted
#[derive(Debug, Clone)]
pub struct NewBlob {
    pub payload: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl NewBlob {
    pub fn new(payload: String, content_type: String, created_at: DateTime<Utc>) -> Self {
        Self {
            payload,
            content_type,
            created_at,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + blob_ttl()
    }

    /// Attach the identifier the store assigned
    pub fn into_record(self, id: BlobId) -> BlobRecord {
        BlobRecord {
            id,
            payload: self.payload,
            content_type: self.content_type,
            created_at: self.created_at,
        }
    }
}

/// Observable state of a persisted record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobState {
    /// Persisted and retrievable
    Stored,
    /// Past its deadline; readers treat it as absent even before reclamation
    Expired,
}

/// A persisted blob
#[derive(Debug, Clone, PartialEq)]
pub struct BlobRecord {
    pub id: BlobId,
    pub payload: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + blob_ttl()
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> BlobState {
        if now < self.expires_at() {
            BlobState::Stored
        } else {
            BlobState::Expired
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == BlobState::Stored
    }

    /// Seconds left before expiry, rounded up and capped at the TTL.
    ///
    /// A live record always reports at least one second.
    pub fn remaining_secs_at(&self, now: DateTime<Utc>) -> u64 {
        let remaining_ms = (self.expires_at() - now).num_milliseconds();
        if remaining_ms <= 0 {
            return 0;
        }
        let secs = (remaining_ms + 999) / 1000;
        secs.min(BLOB_TTL_SECS) as u64
    }
}
