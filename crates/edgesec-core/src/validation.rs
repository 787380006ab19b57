//! Validation of frames received from devices
//!
//! Everything read off a transport is untrusted. Frames are size-checked and
//! split here before any field reaches the handshake or session code.

use crate::wire::DEVICE_ID_SIZE;

/// Input validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    TooLarge(String),
    TooShort(String),
    InvalidFormat(String),
    InvalidCharacters(String),
    Empty(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge(field) => write!(f, "Field '{}' exceeds maximum size", field),
            Self::TooShort(field) => write!(f, "Field '{}' is truncated", field),
            Self::InvalidFormat(field) => write!(f, "Field '{}' has invalid format", field),
            Self::InvalidCharacters(field) => {
                write!(f, "Field '{}' contains invalid characters", field)
            }
            Self::Empty(field) => write!(f, "Field '{}' cannot be empty", field),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Reject empty frames and frames over `max`.
pub fn validate_frame_size(frame: &[u8], max: usize, field: &str) -> Result<(), ValidationError> {
    if frame.is_empty() {
        return Err(ValidationError::Empty(field.to_string()));
    }

    if frame.len() > max {
        return Err(ValidationError::TooLarge(field.to_string()));
    }

    Ok(())
}

/// Extract the object id from a handshake response.
///
/// The first [`DEVICE_ID_SIZE`] bytes are the id as UTF-8 text. Anything
/// after them is ignored.
pub fn validate_handshake_response(frame: &[u8], max: usize) -> Result<String, ValidationError> {
    const FIELD: &str = "handshake_response";

    validate_frame_size(frame, max, FIELD)?;
    if frame.len() < DEVICE_ID_SIZE {
        return Err(ValidationError::TooShort(FIELD.to_string()));
    }

    let id = std::str::from_utf8(&frame[..DEVICE_ID_SIZE])
        .map_err(|_| ValidationError::InvalidFormat("object_id".to_string()))?;
    if id.chars().any(char::is_control) {
        return Err(ValidationError::InvalidCharacters("object_id".to_string()));
    }

    Ok(id.to_string())
}

/// Split a `ciphertext ++ signature` frame.
///
/// The ciphertext part must be non-empty.
pub fn validate_signed_frame(
    frame: &[u8],
    signature_size: usize,
    max: usize,
) -> Result<(&[u8], &[u8]), ValidationError> {
    const FIELD: &str = "secure_frame";

    validate_frame_size(frame, max, FIELD)?;
    if frame.len() <= signature_size {
        return Err(ValidationError::TooShort(FIELD.to_string()));
    }

    Ok(frame.split_at(frame.len() - signature_size))
}

/// Sanitizes a string for logging (removes control characters)
pub fn sanitize_for_log(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control())
        .take(64) // device ids are short
        .collect()
}
