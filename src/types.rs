//! Shared types for Manna

use hyper::StatusCode;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, MannaError>;

/// Errors surfaced by the blob core and the transport
#[derive(Debug, Error)]
pub enum MannaError {
    #[error("No image provided")]
    MissingPayload,

    #[error("Invalid image format: expected a base64 string starting with data:image")]
    InvalidFormat,

    #[error("Image not found")]
    NotFound,

    #[error("Stored image could not be decoded: {0}")]
    CorruptPayload(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store rejected document: {0}")]
    StoreRejected(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MannaError {
    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            MannaError::MissingPayload
            | MannaError::InvalidFormat
            | MannaError::StoreRejected(_)
            | MannaError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            MannaError::NotFound => StatusCode::NOT_FOUND,
            MannaError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            MannaError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            MannaError::CorruptPayload(_)
            | MannaError::Database(_)
            | MannaError::Config(_)
            | MannaError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for error bodies
    pub fn code(&self) -> &'static str {
        match self {
            MannaError::MissingPayload => "MISSING_PAYLOAD",
            MannaError::InvalidFormat => "INVALID_FORMAT",
            MannaError::NotFound => "NOT_FOUND",
            MannaError::CorruptPayload(_) => "CORRUPT_PAYLOAD",
            MannaError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            MannaError::StoreRejected(_) => "STORE_REJECTED",
            MannaError::Database(_) => "DATABASE_ERROR",
            MannaError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            MannaError::InvalidBody(_) => "INVALID_BODY",
            MannaError::Config(_) => "CONFIG_ERROR",
            MannaError::Io(_) => "IO_ERROR",
        }
    }

    /// Short message safe to show to any client
    pub fn public_message(&self) -> &'static str {
        match self {
            MannaError::MissingPayload => "No image provided",
            MannaError::InvalidFormat => {
                "Invalid image format. Must be a base64 string starting with data:image"
            }
            MannaError::NotFound => "Image not found",
            MannaError::CorruptPayload(_) => "Error reading image",
            MannaError::StoreUnavailable(_) => "Error connecting to the database",
            MannaError::StoreRejected(_) => "Validation error",
            MannaError::Database(_) => "Database error",
            MannaError::PayloadTooLarge(_) => "Request body too large",
            MannaError::InvalidBody(_) => "Invalid request body",
            MannaError::Config(_) | MannaError::Io(_) => "Internal server error",
        }
    }

    /// Diagnostic detail, if the variant carries any
    pub fn details(&self) -> Option<String> {
        match self {
            MannaError::CorruptPayload(d)
            | MannaError::StoreUnavailable(d)
            | MannaError::StoreRejected(d)
            | MannaError::Database(d)
            | MannaError::InvalidBody(d)
            | MannaError::Config(d) => Some(d.clone()),
            MannaError::Io(e) => Some(e.to_string()),
            _ => None,
        }
    }

    /// Whether the failure is on the server side (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_4xx() {
        assert_eq!(MannaError::MissingPayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MannaError::InvalidFormat.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(MannaError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert!(!MannaError::NotFound.is_server_error());
    }

    #[test]
    fn test_server_errors_are_5xx() {
        let corrupt = MannaError::CorruptPayload("bad base64".into());
        assert!(corrupt.is_server_error());
        assert_eq!(corrupt.details().as_deref(), Some("bad base64"));

        let down = MannaError::StoreUnavailable("timeout".into());
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.code(), "STORE_UNAVAILABLE");
    }

    #[test]
    fn test_missing_payload_has_no_details() {
        assert!(MannaError::MissingPayload.details().is_none());
    }
}
