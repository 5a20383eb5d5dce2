//! Data URL handling for submitted images
//!
//! A payload looks like `data:image/png;base64,iVBORw0KGgo=`. Admission only
//! checks the envelope (marker prefix and base64 delimiter); the bytes are not
//! decoded until the blob is read back.

use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine as _;

use crate::types::{MannaError, Result};

/// Marker every strictly validated payload must start with
pub const DATA_IMAGE_PREFIX: &str = "data:image";

/// Separates the metadata section from the base64 data
pub const BASE64_DELIMITER: &str = ";base64,";

/// Content type recorded when the payload does not declare a usable one
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

const DATA_SCHEME: &str = "data:";

/// Standard alphabet, padding optional, trailing bits tolerated.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Check whether `raw` is a well-formed image data URL envelope.
///
/// Both the `data:image` prefix and a `;base64,` delimiter after it are
/// required. Whether the trailing data decodes is not checked here.
pub fn validate(raw: &str) -> bool {
    match raw.strip_prefix(DATA_IMAGE_PREFIX) {
        Some(rest) => rest.contains(BASE64_DELIMITER),
        None => false,
    }
}

/// Extract the declared content type, falling back to `image/png`.
///
/// Malformed or missing tags are not an error.
pub fn extract_content_type(raw: &str) -> &str {
    declared_content_type(raw).unwrap_or(DEFAULT_CONTENT_TYPE)
}

fn declared_content_type(raw: &str) -> Option<&str> {
    let rest = raw.strip_prefix(DATA_SCHEME)?;
    // Metadata ends at the first comma
    let meta = rest.split(',').next()?;
    let end = meta.find(';')?;
    let tag = meta[..end].trim();
    is_image_type(tag).then_some(tag)
}

/// A usable `image/*` type. Anything else could be rendered as a document
/// on this origin when served back.
pub(crate) fn is_image_type(tag: &str) -> bool {
    is_mime_like(tag)
        && tag
            .split_once('/')
            .is_some_and(|(kind, _)| kind.eq_ignore_ascii_case("image"))
}

/// `type/subtype` made only of visible ASCII, so it is usable as a header value
fn is_mime_like(tag: &str) -> bool {
    match tag.split_once('/') {
        Some((kind, sub)) => {
            !kind.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && tag.bytes().all(|b| b.is_ascii_graphic())
        }
        None => false,
    }
}

/// Return the base64 section that follows the delimiter.
pub fn data_section(raw: &str) -> Option<&str> {
    raw.split_once(BASE64_DELIMITER).map(|(_, data)| data)
}

/// Decode the binary content of a stored payload.
///
/// Spaces are read as `+` (form decoding turns `+` into a space) and line
/// breaks or tabs are skipped.
pub fn decode_payload(raw: &str) -> Result<Vec<u8>> {
    let data = data_section(raw).ok_or_else(|| {
        MannaError::CorruptPayload(format!("payload has no '{}' delimiter", BASE64_DELIMITER))
    })?;

    let cleaned: String = data
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .map(|c| if c == ' ' { '+' } else { c })
        .collect();

    LENIENT_BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| MannaError::CorruptPayload(format!("base64 decode failed: {}", e)))
}
