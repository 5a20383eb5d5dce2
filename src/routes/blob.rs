//! Image upload and retrieval routes
//!
//! - `POST /upload` - JSON (`{"img": ..., "mimeType"?: ...}`) or form body
//! - `GET /api.img?img=...` - query parameter upload, always strictly validated
//! - `GET|HEAD /image/{id}` - decoded bytes with the recorded content type
//!
//! ## Example Usage
//!
//! ```bash
//! curl -X POST http://localhost:3000/upload \
//!   -H 'Content-Type: application/json' \
//!   -d '{"img":"data:image/png;base64,iVBORw0KGgo="}'
//! # {"url":"http://localhost:3000/image/6710...","expiraEm":"16/10/2026, 19:00:00",...}
//! ```

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Body;
use hyper::header::HeaderMap;
use hyper::{header, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::sync::Arc;
use tracing::debug;

use super::{error_response, finish, json_response};
use crate::blob::{Submitted, SubmitRequest, ValidationPolicy};
use crate::server::AppState;
use crate::types::MannaError;

/// Prefix of retrieval paths
pub const IMAGE_PATH_PREFIX: &str = "/image/";

/// Response for both upload routes
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    /// Localized expiry for display
    #[serde(rename = "expiraEm")]
    pub expira_em: String,
    pub id: String,
    /// RFC 3339 expiry in UTC
    #[serde(rename = "expiresAt")]
    pub expires_at: String,
}

/// Upload body, JSON or form encoded
#[derive(Debug, Default, Deserialize)]
struct UploadBody {
    img: Option<String>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

/// Handle POST /upload
///
/// Validation is lenient unless STRICT_BODY_VALIDATION is set; the content
/// type comes from `mimeType` when given, otherwise from the payload.
pub async fn handle_upload_body<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let verbose = state.args.dev_mode;
    let (parts, body) = req.into_parts();

    let bytes = match read_body(body, state.args.max_body_bytes).await {
        Ok(b) => b,
        Err(e) => return error_response(&e, verbose),
    };

    let upload = match parse_upload_body(&parts.headers, &bytes) {
        Ok(u) => u,
        Err(e) => return error_response(&e, verbose),
    };

    let policy = if state.args.strict_body_validation {
        ValidationPolicy::Strict
    } else {
        ValidationPolicy::Lenient
    };

    let request = SubmitRequest::new(upload.img, policy).with_content_type(upload.mime_type);
    match state.service.submit(request).await {
        Ok(submitted) => upload_response(&state, &parts.headers, &submitted),
        Err(e) => error_response(&e, verbose),
    }
}

/// Handle GET /api.img?img=...
pub async fn handle_upload_query<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>> {
    let verbose = state.args.dev_mode;
    let img = query_param(req.uri().query(), "img");

    debug!(present = img.is_some(), "Query upload received");

    let request = SubmitRequest::new(img, ValidationPolicy::Strict);
    match state.service.submit(request).await {
        Ok(submitted) => upload_response(&state, req.headers(), &submitted),
        Err(e) => error_response(&e, verbose),
    }
}

/// Handle GET|HEAD /image/{id}
pub async fn handle_get_image(state: Arc<AppState>, id: &str, head_only: bool) -> Response<Full<Bytes>> {
    let retrieved = match state.service.retrieve(id).await {
        Ok(r) => r,
        Err(e) => return error_response(&e, state.args.dev_mode),
    };

    let size = retrieved.bytes.len();
    let body = if head_only { Bytes::new() } else { retrieved.bytes.clone() };

    finish(
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, &retrieved.content_type)
            .header(header::CONTENT_LENGTH, size)
            .header(header::CACHE_CONTROL, retrieved.cache_control())
            .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
            // Scriptable image formats (SVG) must not run on this origin
            .header(header::CONTENT_SECURITY_POLICY, "default-src 'none'; sandbox")
            // Embeddable from other origins
            .header("Cross-Origin-Resource-Policy", "cross-origin"),
        body,
    )
}

fn upload_response(state: &AppState, headers: &HeaderMap, submitted: &Submitted) -> Response<Full<Bytes>> {
    let base = request_base(state, headers);
    let response = UploadResponse {
        url: format!("{}{}{}", base, IMAGE_PATH_PREFIX, submitted.id),
        expira_em: state.clock.format(submitted.expires_at),
        id: submitted.id.to_string(),
        expires_at: submitted.expires_at.to_rfc3339(),
    };
    json_response(StatusCode::OK, &response)
}

/// Collect a body, enforcing the size cap
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, MannaError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(MannaError::PayloadTooLarge(limit))
        }
        Err(e) => Err(MannaError::InvalidBody(e.to_string())),
    }
}

fn parse_upload_body(headers: &HeaderMap, bytes: &Bytes) -> Result<UploadBody, MannaError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(UploadBody::default());
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        serde_urlencoded::from_bytes(bytes)
            .map_err(|e| MannaError::InvalidBody(format!("Invalid form body: {}", e)))
    } else {
        serde_json::from_slice(bytes).map_err(|e| MannaError::InvalidBody(format!("Invalid JSON: {}", e)))
    }
}

/// Percent-decode one query parameter. `+` is kept as is, since it is part
/// of the base64 alphabet.
fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| {
            urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
}

/// Base URL for retrieval links: PUBLIC_URL, else scheme + Host of the request
fn request_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = state.args.public_base() {
        return base.to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.args.bind_addr().to_string());

    format!("{}://{}", scheme, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param_keeps_plus() {
        let q = Some("img=data%3Aimage%2Fpng%3Bbase64%2C+%2F8%3D&x=1");
        assert_eq!(
            query_param(q, "img").as_deref(),
            Some("data:image/png;base64,+/8=")
        );
        assert_eq!(query_param(q, "x").as_deref(), Some("1"));
        assert_eq!(query_param(q, "missing"), None);
        assert_eq!(query_param(None, "img"), None);
    }

    #[test]
    fn test_query_param_unencoded_value() {
        let q = Some("img=data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(
            query_param(q, "img").as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn test_parse_upload_body_json_and_form() {
        let mut headers = HeaderMap::new();
        let json = Bytes::from_static(br#"{"img":"data:image/png;base64,AAAA","mimeType":"image/x-icon"}"#);
        let parsed = parse_upload_body(&headers, &json).unwrap();
        assert_eq!(parsed.img.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(parsed.mime_type.as_deref(), Some("image/x-icon"));

        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        let form = Bytes::from_static(b"img=data%3Aimage%2Fgif%3Bbase64%2CR0lGOD");
        let parsed = parse_upload_body(&headers, &form).unwrap();
        assert_eq!(parsed.img.as_deref(), Some("data:image/gif;base64,R0lGOD"));
    }

    #[test]
    fn test_parse_upload_body_empty_and_invalid() {
        let headers = HeaderMap::new();
        assert!(parse_upload_body(&headers, &Bytes::new()).unwrap().img.is_none());
        assert!(matches!(
            parse_upload_body(&headers, &Bytes::from_static(b"{not json")),
            Err(MannaError::InvalidBody(_))
        ));
    }

    #[tokio::test]
    async fn test_read_body_limit() {
        let body = Full::new(Bytes::from(vec![b'a'; 64]));
        assert!(matches!(read_body(body, 16).await, Err(MannaError::PayloadTooLarge(16))));

        let body = Full::new(Bytes::from_static(b"small"));
        assert_eq!(read_body(body, 16).await.unwrap(), Bytes::from_static(b"small"));
    }
}
