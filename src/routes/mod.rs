//! HTTP routes for Manna

pub mod blob;
pub mod health;

pub use blob::{handle_get_image, handle_upload_body, handle_upload_query, UploadResponse};
pub use health::{liveness, LivenessResponse};

use bytes::Bytes;
use http_body_util::Full;
use hyper::http::response::Builder;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::{error, warn};

use crate::types::MannaError;

/// Finish a response builder, degrading to a bare 500 if a header was rejected
pub(crate) fn finish(builder: Builder, body: Bytes) -> Response<Full<Bytes>> {
    builder.body(Full::new(body)).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut response = Response::new(Full::new(Bytes::from_static(b"Internal server error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// JSON response with the given status
pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(body) {
        Ok(json) => finish(
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json"),
            Bytes::from(json),
        ),
        Err(e) => error_response(&MannaError::Database(format!("serialize failed: {}", e)), false),
    }
}

/// Convert a MannaError into a JSON error response.
///
/// `details` is only included when `verbose` (dev mode) is on.
pub fn error_response(err: &MannaError, verbose: bool) -> Response<Full<Bytes>> {
    if err.is_server_error() {
        error!(code = err.code(), "Request failed: {}", err);
    } else {
        warn!(code = err.code(), "Request rejected: {}", err);
    }

    let mut body = serde_json::json!({
        "error": err.public_message(),
        "code": err.code(),
    });
    if verbose {
        if let Some(details) = err.details() {
            body["details"] = serde_json::Value::String(details);
        }
    }

    finish(
        Response::builder()
            .status(err.status_code())
            .header(header::CONTENT_TYPE, "application/json"),
        Bytes::from(body.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_response_hides_details_by_default() {
        let err = MannaError::Database("E11000 duplicate key".into());
        let response = error_response(&err, false);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Database error");
        assert_eq!(json["code"], "DATABASE_ERROR");
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_error_response_verbose() {
        let err = MannaError::CorruptPayload("base64 decode failed".into());
        let json = body_json(error_response(&err, true)).await;
        assert_eq!(json["details"], "base64 decode failed");
    }
}
