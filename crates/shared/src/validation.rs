//! Common validation utilities.

use validator::ValidationError;

/// Maximum length of a registration identifier namespace.
pub const MAX_NAMESPACE_LENGTH: usize = 16;

/// Maximum accepted length of scanned payload text.
///
/// A version 40 QR symbol holds at most 4296 alphanumeric characters, so
/// anything longer did not come off a camera.
pub const MAX_PAYLOAD_LENGTH: usize = 4296;

/// Validates that an event identifier is positive.
pub fn validate_event_id(event_id: i64) -> Result<(), ValidationError> {
    if event_id > 0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("event_id_range");
        err.message = Some("Event ID must be a positive integer".into());
        Err(err)
    }
}

/// Validates a registration identifier namespace (ASCII alphanumerics only).
pub fn validate_namespace(namespace: &str) -> Result<(), ValidationError> {
    let valid = !namespace.is_empty()
        && namespace.len() <= MAX_NAMESPACE_LENGTH
        && namespace.bytes().all(|b| b.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("namespace_format");
        err.message = Some("Namespace must be 1-16 ASCII letters or digits".into());
        Err(err)
    }
}

/// Validates that scanned payload text is non-empty and of plausible length.
pub fn validate_payload_text(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        let mut err = ValidationError::new("payload_empty");
        err.message = Some("Payload is empty".into());
        return Err(err);
    }
    if text.len() > MAX_PAYLOAD_LENGTH {
        let mut err = ValidationError::new("payload_length");
        err.message = Some("Payload exceeds maximum QR capacity".into());
        return Err(err);
    }
    Ok(())
}
