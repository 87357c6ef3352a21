//! QR payload models.
//!
//! Field names on the wire (`registrationId`, `eventId`, `userId`, `userEmail`,
//! `timestamp`) match the codes already printed by the portal.

use chrono::{DateTime, Utc};
use serde_json::json;

use super::registration::{Registration, UNKNOWN_PARTICIPANT_FIELD};

/// Payload embedded in a participant's QR symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    pub registration_id: String,
    pub event_id: i64,
    pub participant_id: String,
    pub participant_email: String,
    pub timestamp: DateTime<Utc>,
}

impl QrPayload {
    /// Serializes the payload to compact JSON.
    pub fn to_json(&self) -> String {
        json!({
            "registrationId": self.registration_id,
            "eventId": self.event_id,
            "userId": self.participant_id,
            "userEmail": self.participant_email,
            "timestamp": shared::time::to_iso(self.timestamp),
        })
        .to_string()
    }
}

impl From<&Registration> for QrPayload {
    fn from(registration: &Registration) -> Self {
        Self {
            registration_id: registration.registration_id.clone(),
            event_id: registration.event_id,
            participant_id: registration.participant_id.clone(),
            participant_email: registration.participant_email.clone(),
            timestamp: registration.timestamp,
        }
    }
}

/// Fields recovered from a scanned code.
///
/// Only `event_id` and `participant_id` are guaranteed; codes printed by other
/// clients may omit the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPayload {
    pub registration_id: Option<String>,
    pub event_id: i64,
    pub participant_id: String,
    pub participant_name: Option<String>,
    pub participant_email: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl ScannedPayload {
    /// Builds an unscanned registration view from the payload alone.
    ///
    /// `fallback_id` is used when the payload carried no registration id.
    pub fn into_transient(self, fallback_id: String, now: DateTime<Utc>) -> Registration {
        Registration {
            registration_id: self.registration_id.unwrap_or(fallback_id),
            event_id: self.event_id,
            participant_id: self.participant_id,
            participant_name: self
                .participant_name
                .unwrap_or_else(|| UNKNOWN_PARTICIPANT_FIELD.to_string()),
            participant_email: self
                .participant_email
                .unwrap_or_else(|| UNKNOWN_PARTICIPANT_FIELD.to_string()),
            timestamp: self.timestamp.unwrap_or(now),
            scanned: false,
            scan_timestamp: None,
            attendance_method: None,
        }
    }
}
