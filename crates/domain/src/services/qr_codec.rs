//! QR payload codec.
//!
//! Registration identifiers follow `<namespace>-<eventId>-<participantId>-<YYYYMMDD>`
//! so that re-issuing a code for the same participant, event and day yields
//! the same identifier.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{Participant, QrPayload, Registration, ScannedPayload};

/// Errors produced while decoding scanned text.
///
/// These are ordinary outcomes: cameras pick up noise and unrelated codes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Payload is empty or too long")]
    InvalidLength,

    #[error("Payload is not JSON")]
    NotJson,

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Payload is missing field {0}")]
    MissingField(&'static str),

    #[error("Payload field {field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Registration ID {0} does not match the payload's event or participant")]
    Inconsistent(String),
}

/// Errors constructing a codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid registration namespace: {0}")]
    InvalidNamespace(String),
}

/// Components of a conventional registration identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationIdParts {
    pub namespace: String,
    pub event_id: i64,
    pub participant_id: String,
    pub issue_date: NaiveDate,
}

lazy_static::lazy_static! {
    static ref REGISTRATION_ID_REGEX: regex::Regex =
        regex::Regex::new(r"^([A-Za-z0-9]{1,16})-(\d{1,18})-(\S+)-(\d{8})$").unwrap();
}

/// Splits a registration identifier into its generating fields.
///
/// Returns `None` for identifiers that do not follow the convention, such as
/// ids assigned by the backend.
pub fn parse_registration_id(registration_id: &str) -> Option<RegistrationIdParts> {
    let caps = REGISTRATION_ID_REGEX.captures(registration_id)?;
    Some(RegistrationIdParts {
        namespace: caps.get(1)?.as_str().to_string(),
        event_id: caps.get(2)?.as_str().parse().ok()?,
        participant_id: caps.get(3)?.as_str().to_string(),
        issue_date: shared::time::parse_compact_date(caps.get(4)?.as_str()).ok()?,
    })
}

/// Encodes registrations into QR payload text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCodec {
    namespace: String,
}

impl QrCodec {
    pub fn new(namespace: impl Into<String>) -> Result<Self, CodecError> {
        let namespace = namespace.into();
        shared::validation::validate_namespace(&namespace)
            .map_err(|_| CodecError::InvalidNamespace(namespace.clone()))?;
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Derives the registration identifier for a participant, event and issue day.
    pub fn registration_id(
        &self,
        event_id: i64,
        participant_id: &str,
        issued_at: DateTime<Utc>,
    ) -> String {
        format!(
            "{}-{}-{}-{}",
            self.namespace,
            event_id,
            participant_id,
            shared::time::compact_date(issued_at)
        )
    }

    /// Builds the payload for a registration intent.
    pub fn payload(
        &self,
        event_id: i64,
        participant: &Participant,
        issued_at: DateTime<Utc>,
    ) -> QrPayload {
        QrPayload {
            registration_id: self.registration_id(event_id, &participant.id, issued_at),
            event_id,
            participant_id: participant.id.clone(),
            participant_email: participant.email.clone(),
            timestamp: issued_at,
        }
    }

    /// Encodes a registration intent. Deterministic for a fixed `issued_at`.
    pub fn encode(
        &self,
        event_id: i64,
        participant: &Participant,
        issued_at: DateTime<Utc>,
    ) -> String {
        self.payload(event_id, participant, issued_at).to_json()
    }

    /// Re-encodes the code of an existing registration.
    pub fn encode_registration(&self, registration: &Registration) -> String {
        QrPayload::from(registration).to_json()
    }

    /// Decodes scanned text. Never panics, whatever the input.
    pub fn decode(&self, text: &str) -> Result<ScannedPayload, DecodeError> {
        decode(text)
    }
}

/// Decodes scanned text into payload fields.
pub fn decode(text: &str) -> Result<ScannedPayload, DecodeError> {
    shared::validation::validate_payload_text(text).map_err(|_| DecodeError::InvalidLength)?;

    let value: Value = serde_json::from_str(text.trim()).map_err(|_| DecodeError::NotJson)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let event_id = required_event_id(object)?;
    let participant_id = required_participant_id(object)?;
    let registration_id = optional_string(object, "registrationId")?;
    let timestamp = match optional_string(object, "timestamp")? {
        Some(raw) => Some(shared::time::parse_iso(&raw).map_err(|e| {
            DecodeError::InvalidField {
                field: "timestamp",
                reason: e.to_string(),
            }
        })?),
        None => None,
    };

    if let Some(id) = &registration_id {
        if let Some(parts) = parse_registration_id(id) {
            if parts.event_id != event_id || parts.participant_id != participant_id {
                return Err(DecodeError::Inconsistent(id.clone()));
            }
        }
    }

    Ok(ScannedPayload {
        registration_id,
        event_id,
        participant_id,
        participant_name: optional_string(object, "userName")?,
        participant_email: optional_string(object, "userEmail")?,
        timestamp,
    })
}

fn required_event_id(object: &Map<String, Value>) -> Result<i64, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidField {
        field: "eventId",
        reason: reason.to_string(),
    };
    let event_id = match object.get("eventId") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("eventId")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| invalid("not an integer"))?,
        Some(Value::String(s)) => s.trim().parse().map_err(|_| invalid("not an integer"))?,
        Some(_) => return Err(invalid("unexpected type")),
    };
    if event_id <= 0 {
        return Err(invalid("must be positive"));
    }
    Ok(event_id)
}

fn required_participant_id(object: &Map<String, Value>) -> Result<String, DecodeError> {
    let invalid = |reason: &str| DecodeError::InvalidField {
        field: "userId",
        reason: reason.to_string(),
    };
    let id = match object.get("userId") {
        None | Some(Value::Null) => return Err(DecodeError::MissingField("userId")),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(invalid("unexpected type")),
    };
    if id.is_empty() {
        return Err(invalid("empty"));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    Ok(id)
}

fn optional_string(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, DecodeError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DecodeError::InvalidField {
            field,
            reason: "expected a string".to_string(),
        }),
    }
}
