//! Wire shapes exchanged with the portal backend.
//!
//! Responses are decoded leniently (ids may arrive as numbers or strings) and
//! then validated before they reach the registration set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::registration::{AttendanceMethod, Registration, UNKNOWN_PARTICIPANT_FIELD};

/// Body of `POST /events/{id}/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RegisterRequest {
    pub user_id: String,
    pub registration_id: String,
}

/// Body of `POST /events/{id}/attendance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttendanceRequest {
    pub registration_id: String,
    pub user_id: String,
}

/// Identifier that the backend may send as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleId {
    Int(i64),
    Text(String),
}

impl FlexibleId {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FlexibleId::Int(n) => Some(*n),
            FlexibleId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for FlexibleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlexibleId::Int(n) => write!(f, "{}", n),
            FlexibleId::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Registration as returned by `GET /registrations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RemoteRegistration {
    pub id: FlexibleId,
    pub event_id: FlexibleId,
    pub user_id: FlexibleId,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub attended: Option<bool>,
    #[serde(default)]
    pub attendance_time: Option<DateTime<Utc>>,
}

/// Reasons a remote record is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemoteRecordError {
    #[error("Event ID is not a positive integer: {0}")]
    InvalidEventId(String),
    #[error("Registration {0} has an empty user ID")]
    EmptyUserId(String),
}

impl RemoteRegistration {
    /// Validates the record and converts it to a local registration.
    ///
    /// An attended record without a time is stamped with `now` so the local
    /// invariant holds.
    pub fn into_registration(self, now: DateTime<Utc>) -> Result<Registration, RemoteRecordError> {
        let event_id = self
            .event_id
            .as_i64()
            .filter(|id| *id > 0)
            .ok_or_else(|| RemoteRecordError::InvalidEventId(self.event_id.to_string()))?;

        let participant_id = self.user_id.to_string();
        if participant_id.trim().is_empty() {
            return Err(RemoteRecordError::EmptyUserId(self.id.to_string()));
        }

        let scanned = self.attended.unwrap_or(false);
        let scan_timestamp = scanned.then(|| self.attendance_time.unwrap_or(now));

        Ok(Registration {
            registration_id: self.id.to_string(),
            event_id,
            participant_id,
            participant_name: self
                .user_name
                .unwrap_or_else(|| UNKNOWN_PARTICIPANT_FIELD.to_string()),
            participant_email: self
                .user_email
                .unwrap_or_else(|| UNKNOWN_PARTICIPANT_FIELD.to_string()),
            timestamp: self.created_at.unwrap_or(now),
            scanned,
            scan_timestamp,
            attendance_method: scanned.then_some(AttendanceMethod::QrScan),
        })
    }
}

/// Event as listed by `GET /events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventSummary {
    pub id: FlexibleId,
    pub title: String,
    #[serde(default, alias = "date_time")]
    pub date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 19, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_flexible_id_accepts_numbers_and_strings() {
        let ids: Vec<FlexibleId> = serde_json::from_str(r#"[12, "34", "abc"]"#).unwrap();
        assert_eq!(ids[0].as_i64(), Some(12));
        assert_eq!(ids[1].as_i64(), Some(34));
        assert_eq!(ids[2].as_i64(), None);
        assert_eq!(ids[2].to_string(), "abc");
    }

    #[test]
    fn test_remote_registration_conversion() {
        let json = r#"{
            "id": 99,
            "event_id": "42",
            "user_id": 5,
            "user_name": "Ada",
            "user_email": "ada@example.com",
            "created_at": "2024-10-18T12:00:00Z",
            "attended": true,
            "attendance_time": "2024-10-19T09:00:00Z"
        }"#;
        let remote: RemoteRegistration = serde_json::from_str(json).unwrap();
        let reg = remote.into_registration(now()).unwrap();

        assert_eq!(reg.registration_id, "99");
        assert_eq!(reg.event_id, 42);
        assert_eq!(reg.participant_id, "5");
        assert!(reg.scanned);
        assert_eq!(
            reg.scan_timestamp,
            Some(Utc.with_ymd_and_hms(2024, 10, 19, 9, 0, 0).unwrap())
        );
        assert!(reg.is_consistent());
    }

    #[test]
    fn test_remote_registration_minimal_fields() {
        let json = r#"{"id": "r-1", "event_id": 3, "user_id": "u1"}"#;
        let remote: RemoteRegistration = serde_json::from_str(json).unwrap();
        let reg = remote.into_registration(now()).unwrap();

        assert_eq!(reg.participant_name, UNKNOWN_PARTICIPANT_FIELD);
        assert_eq!(reg.timestamp, now());
        assert!(!reg.scanned);
        assert!(reg.is_consistent());
    }

    #[test]
    fn test_remote_registration_attended_without_time_is_stamped() {
        let json = r#"{"id": 1, "event_id": 3, "user_id": "u1", "attended": true}"#;
        let remote: RemoteRegistration = serde_json::from_str(json).unwrap();
        let reg = remote.into_registration(now()).unwrap();
        assert_eq!(reg.scan_timestamp, Some(now()));
    }

    #[test]
    fn test_remote_registration_rejects_bad_event_id() {
        let json = r#"{"id": 1, "event_id": "5f1c-uuid", "user_id": "u1"}"#;
        let remote: RemoteRegistration = serde_json::from_str(json).unwrap();
        assert!(matches!(
            remote.into_registration(now()),
            Err(RemoteRecordError::InvalidEventId(_))
        ));
    }

    #[test]
    fn test_event_summary_accepts_date_time() {
        let json = r#"{"id": 3, "title": "Robotics Night", "date_time": "2024-11-02T18:00:00Z"}"#;
        let event: EventSummary = serde_json::from_str(json).unwrap();
        assert_eq!(event.id.as_i64(), Some(3));
        assert_eq!(event.date.as_deref(), Some("2024-11-02T18:00:00Z"));
        assert!(event.location.is_none());
    }

    #[test]
    fn test_request_bodies_are_snake_case() {
        let body = serde_json::to_value(RegisterRequest {
            user_id: "u1".to_string(),
            registration_id: "SPARC-42-u1-20241018".to_string(),
        })
        .unwrap();
        assert_eq!(body["user_id"], "u1");
        assert_eq!(body["registration_id"], "SPARC-42-u1-20241018");
    }
}
