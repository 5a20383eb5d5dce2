//! Blob service: admission and retrieval
//!
//! Submit: validate -> build record -> persist -> report id and deadline.
//! Retrieve: fetch -> logical expiry check -> decode -> bytes + content type.
//!
//! Every failure comes back as a `MannaError`; nothing here panics on bad
//! input or store trouble.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::encoding::{self, is_image_type};
use super::record::{BlobId, NewBlob};
use crate::store::BlobStore;
use crate::types::{MannaError, Result};

/// Served for stored records whose content type is unusable as a header
const FALLBACK_SERVE_TYPE: &str = "application/octet-stream";

/// How strictly a submission's envelope is checked before persisting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Reject anything that is not a `data:image...;base64,` envelope
    Strict,
    /// Persist any non-empty payload; decode problems surface on retrieval
    #[default]
    Lenient,
}

/// A submission as received from the transport
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub payload: Option<String>,
    /// Explicit content type; derived from the payload when absent
    pub content_type: Option<String>,
    pub policy: ValidationPolicy,
}

impl SubmitRequest {
    pub fn new(payload: Option<String>, policy: ValidationPolicy) -> Self {
        Self {
            payload,
            content_type: None,
            policy,
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

/// Outcome of a successful submit
#[derive(Debug, Clone)]
pub struct Submitted {
    pub id: BlobId,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Decoded blob ready to be served
#[derive(Debug, Clone)]
pub struct Retrieved {
    pub bytes: Bytes,
    pub content_type: String,
    /// Freshness budget for downstream caches
    pub max_age_secs: u64,
}

impl Retrieved {
    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.max_age_secs)
    }
}

/// Orchestrates the encoding checks and the store
#[derive(Clone)]
pub struct BlobService {
    store: Arc<dyn BlobStore>,
}

impl BlobService {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub async fn submit(&self, request: SubmitRequest) -> Result<Submitted> {
        self.submit_at(request, Utc::now()).await
    }

    /// Submit with an explicit admission time
    pub async fn submit_at(&self, request: SubmitRequest, now: DateTime<Utc>) -> Result<Submitted> {
        let payload = match request.payload {
            Some(p) if !p.trim().is_empty() => p,
            _ => {
                debug!("Submit rejected: no payload");
                return Err(MannaError::MissingPayload);
            }
        };

        if request.policy == ValidationPolicy::Strict && !encoding::validate(&payload) {
            warn!(len = payload.len(), "Submit rejected: invalid image format");
            return Err(MannaError::InvalidFormat);
        }

        let content_type = resolve_content_type(request.content_type.as_deref(), &payload);
        let blob = NewBlob::new(payload, content_type.clone(), now);
        let expires_at = blob.expires_at();

        let id = self.store.create(blob).await.inspect_err(|e| {
            error!(error = %e, "Failed to persist blob");
        })?;

        info!(
            id = %id,
            content_type = %content_type,
            expires_at = %expires_at.to_rfc3339(),
            "Blob stored"
        );

        Ok(Submitted {
            id,
            content_type,
            created_at: now,
            expires_at,
        })
    }

    pub async fn retrieve(&self, id: &str) -> Result<Retrieved> {
        self.retrieve_at(id, Utc::now()).await
    }

    /// Retrieve as seen at `now`; records past their deadline are absent
    pub async fn retrieve_at(&self, id: &str, now: DateTime<Utc>) -> Result<Retrieved> {
        let blob_id: BlobId = id.parse().inspect_err(|_| {
            debug!(id = %id, "Malformed blob id");
        })?;

        let record = match self.store.find_by_id(&blob_id).await? {
            Some(record) => record,
            None => {
                warn!(id = %blob_id, "Blob not found");
                return Err(MannaError::NotFound);
            }
        };

        if !record.is_live_at(now) {
            warn!(
                id = %blob_id,
                expired_at = %record.expires_at().to_rfc3339(),
                "Blob expired but not yet reclaimed"
            );
            return Err(MannaError::NotFound);
        }

        let bytes = encoding::decode_payload(&record.payload).inspect_err(|e| {
            error!(id = %blob_id, error = %e, "Stored blob failed to decode");
        })?;

        let content_type = if is_image_type(&record.content_type) {
            record.content_type.clone()
        } else {
            warn!(id = %blob_id, content_type = %record.content_type, "Unusable stored content type");
            FALLBACK_SERVE_TYPE.to_string()
        };

        debug!(id = %blob_id, size = bytes.len(), "Serving blob");

        Ok(Retrieved {
            bytes: Bytes::from(bytes),
            content_type,
            max_age_secs: record.remaining_secs_at(now),
        })
    }
}

/// Explicit type wins when it is an image type, otherwise derive it from the payload
fn resolve_content_type(explicit: Option<&str>, payload: &str) -> String {
    match explicit.map(str::trim) {
        Some(ct) if is_image_type(ct) => ct.to_string(),
        Some(ct) if !ct.is_empty() => {
            warn!(content_type = %ct, "Ignoring unusable explicit content type");
            encoding::extract_content_type(payload).to_string()
        }
        _ => encoding::extract_content_type(payload).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::record::{BlobRecord, BLOB_TTL_SECS};
    use crate::store::MemoryBlobStore;
    use chrono::{Duration, TimeZone};
    use tokio_test::{assert_err, assert_ok};

    const PNG_URL: &str = "data:image/png;base64,iVBORw0KGgo=";
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn service() -> (BlobService, Arc<MemoryBlobStore>) {
        let store = Arc::new(MemoryBlobStore::new());
        (BlobService::new(store.clone()), store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl BlobStore for UnavailableStore {
        async fn connect(&self) -> Result<()> {
            Err(MannaError::StoreUnavailable("connection refused".into()))
        }
        async fn create(&self, _blob: NewBlob) -> Result<BlobId> {
            Err(MannaError::StoreUnavailable("connection refused".into()))
        }
        async fn find_by_id(&self, _id: &BlobId) -> Result<Option<BlobRecord>> {
            Err(MannaError::StoreUnavailable("connection refused".into()))
        }
        fn backend(&self) -> &'static str {
            "unavailable"
        }
    }

    #[tokio::test]
    async fn test_round_trip() {
        let (svc, _) = service();
        let submitted = assert_ok!(
            svc.submit_at(SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Strict), t0())
                .await
        );
        assert_eq!(submitted.expires_at, t0() + Duration::hours(5));
        assert_eq!(submitted.content_type, "image/png");

        let retrieved = assert_ok!(svc.retrieve_at(&submitted.id.to_string(), t0()).await);
        assert_eq!(retrieved.bytes.as_ref(), PNG_MAGIC);
        assert_eq!(retrieved.content_type, "image/png");
        assert_eq!(retrieved.cache_control(), "public, max-age=18000");
    }

    #[tokio::test]
    async fn test_missing_payload() {
        let (svc, store) = service();
        for payload in [None, Some(String::new()), Some("   ".into())] {
            let err = assert_err!(svc.submit(SubmitRequest::new(payload, ValidationPolicy::Lenient)).await);
            assert!(matches!(err, MannaError::MissingPayload));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_strict_rejects_and_persists_nothing() {
        let (svc, store) = service();
        for payload in ["notbase64", "iVBORw0KGgo=", "data:image/png,iVBORw0KGgo=", "data:text/plain;base64,aGk="] {
            let err = assert_err!(
                svc.submit(SubmitRequest::new(Some(payload.into()), ValidationPolicy::Strict)).await
            );
            assert!(matches!(err, MannaError::InvalidFormat));
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_lenient_admits_then_fails_to_decode() {
        let (svc, store) = service();
        let submitted = assert_ok!(
            svc.submit_at(SubmitRequest::new(Some("notbase64".into()), ValidationPolicy::Lenient), t0())
                .await
        );
        assert_eq!(store.len(), 1);
        assert_eq!(submitted.content_type, "image/png");

        let err = assert_err!(svc.retrieve_at(&submitted.id.to_string(), t0()).await);
        assert!(matches!(err, MannaError::CorruptPayload(_)));
        assert!(err.details().is_some());
    }

    #[tokio::test]
    async fn test_explicit_content_type() {
        let (svc, _) = service();
        let req = SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Lenient)
            .with_content_type(Some("image/x-icon".into()));
        let submitted = svc.submit_at(req, t0()).await.unwrap();
        assert_eq!(submitted.content_type, "image/x-icon");

        let retrieved = svc.retrieve_at(&submitted.id.to_string(), t0()).await.unwrap();
        assert_eq!(retrieved.content_type, "image/x-icon");

        // Unusable explicit values fall back to derivation
        let req = SubmitRequest::new(Some("data:image/gif;base64,R0lGOD==".into()), ValidationPolicy::Lenient)
            .with_content_type(Some("not a type".into()));
        assert_eq!(svc.submit_at(req, t0()).await.unwrap().content_type, "image/gif");
    }

    #[tokio::test]
    async fn test_non_image_types_are_never_recorded() {
        let (svc, _) = service();
        let html = "data:text/html;base64,PHNjcmlwdD5hbGVydCgxKTwvc2NyaXB0Pg==";

        let submitted = svc
            .submit_at(SubmitRequest::new(Some(html.into()), ValidationPolicy::Lenient), t0())
            .await
            .unwrap();
        assert_eq!(submitted.content_type, "image/png");

        let req = SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Lenient)
            .with_content_type(Some("text/html".into()));
        assert_eq!(svc.submit_at(req, t0()).await.unwrap().content_type, "image/png");
    }

    #[tokio::test]
    async fn test_stored_non_image_type_served_as_octet_stream() {
        let (svc, store) = service();
        let blob = NewBlob::new(PNG_URL.into(), "text/html".into(), t0());
        let id = store.create(blob).await.unwrap();

        let retrieved = svc.retrieve_at(&id.to_string(), t0()).await.unwrap();
        assert_eq!(retrieved.content_type, FALLBACK_SERVE_TYPE);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids() {
        let (svc, _) = service();
        let unknown = BlobId::generate().to_string();
        assert!(matches!(svc.retrieve(&unknown).await, Err(MannaError::NotFound)));
        assert!(matches!(svc.retrieve("nope").await, Err(MannaError::NotFound)));
    }

    #[tokio::test]
    async fn test_logical_expiry_boundaries() {
        let (svc, store) = service();
        let submitted = svc
            .submit_at(SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Strict), t0())
            .await
            .unwrap();
        let id = submitted.id.to_string();

        let just_before = t0() + Duration::seconds(BLOB_TTL_SECS - 1);
        let retrieved = assert_ok!(svc.retrieve_at(&id, just_before).await);
        assert_eq!(retrieved.max_age_secs, 1);

        // Still physically present, logically gone
        let just_after = t0() + Duration::seconds(BLOB_TTL_SECS + 1);
        assert!(matches!(svc.retrieve_at(&id, just_after).await, Err(MannaError::NotFound)));
        assert_eq!(store.len(), 1);

        store.sweep_expired(just_after);
        assert!(matches!(svc.retrieve_at(&id, just_before).await, Err(MannaError::NotFound)));
    }

    #[tokio::test]
    async fn test_repeated_retrieve_is_identical() {
        let (svc, _) = service();
        let submitted = svc
            .submit_at(SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Strict), t0())
            .await
            .unwrap();
        let id = submitted.id.to_string();

        let first = svc.retrieve_at(&id, t0() + Duration::minutes(1)).await.unwrap();
        let second = svc.retrieve_at(&id, t0() + Duration::minutes(1)).await.unwrap();
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.content_type, second.content_type);
    }

    #[tokio::test]
    async fn test_concurrent_submits_get_distinct_ids() {
        let (svc, store) = service();
        let mut handles = Vec::new();
        for i in 0..32u8 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let payload = format!("data:image/png;base64,{}", base64_of(&[i; 6]));
                let id = svc
                    .submit(SubmitRequest::new(Some(payload), ValidationPolicy::Strict))
                    .await
                    .unwrap()
                    .id;
                (i, id)
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for h in handles {
            let (i, id) = h.await.unwrap();
            assert!(ids.insert(id));
            let retrieved = svc.retrieve(&id.to_string()).await.unwrap();
            assert_eq!(retrieved.bytes.as_ref(), &[i; 6]);
        }
        assert_eq!(store.len(), 32);
    }

    #[tokio::test]
    async fn test_store_unavailable_propagates() {
        let svc = BlobService::new(Arc::new(UnavailableStore));
        let err = assert_err!(
            svc.submit(SubmitRequest::new(Some(PNG_URL.into()), ValidationPolicy::Strict)).await
        );
        assert!(matches!(err, MannaError::StoreUnavailable(_)));

        let err = assert_err!(svc.retrieve(&BlobId::generate().to_string()).await);
        assert!(matches!(err, MannaError::StoreUnavailable(_)));

        // Validation still runs before the store is touched
        let err = assert_err!(
            svc.submit(SubmitRequest::new(Some("notbase64".into()), ValidationPolicy::Strict)).await
        );
        assert!(matches!(err, MannaError::InvalidFormat));
    }

    fn base64_of(bytes: &[u8]) -> String {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }
}
