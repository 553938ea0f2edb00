//! Attachment payload decoding.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

/// Standard alphabet, padding optional. Gmail strips padding on some payloads.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("attachment payload is empty")]
    Empty,
    #[error("attachment payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("attachment payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decode a URL-safe Base64 attachment payload to text.
///
/// `-` and `_` are mapped back to `+` and `/` before standard decoding.
pub fn decode_attachment(data: &str) -> Result<String, PayloadError> {
    let normalized: String = data
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    if normalized.is_empty() {
        return Err(PayloadError::Empty);
    }

    let bytes = STANDARD_LENIENT.decode(normalized.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}
