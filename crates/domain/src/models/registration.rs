//! Registration domain model.
//!
//! A registration binds one participant to one event. The participant's name
//! and email are a snapshot taken at registration time and are not re-synced.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default namespace for registration identifiers.
pub const DEFAULT_NAMESPACE: &str = "SPARC";

/// Placeholder used when a scanned payload carries no name or email.
pub const UNKNOWN_PARTICIPANT_FIELD: &str = "Unknown";

/// How attendance was recorded for a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceMethod {
    QrScan,
    Manual,
}

impl std::fmt::Display for AttendanceMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttendanceMethod::QrScan => write!(f, "QR Scan"),
            AttendanceMethod::Manual => write!(f, "Manual"),
        }
    }
}

/// Resolved identity of the person registering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct Participant {
    #[validate(length(min = 1, max = 128, message = "Participant ID must be 1-128 characters"))]
    #[validate(regex(
        path = *PARTICIPANT_ID_REGEX,
        message = "Participant ID must not contain whitespace"
    ))]
    pub id: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email address"))]
    #[validate(length(max = 255, message = "Email must be at most 255 characters"))]
    pub email: String,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

lazy_static::lazy_static! {
    static ref PARTICIPANT_ID_REGEX: regex::Regex = regex::Regex::new(r"^\S+$").unwrap();
}

/// One participant's claim on one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub registration_id: String,
    pub event_id: i64,
    pub participant_id: String,
    pub participant_name: String,
    pub participant_email: String,
    pub timestamp: DateTime<Utc>,
    pub scanned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendance_method: Option<AttendanceMethod>,
}

impl Registration {
    /// Creates an unscanned registration.
    pub fn new(
        registration_id: String,
        event_id: i64,
        participant: &Participant,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            registration_id,
            event_id,
            participant_id: participant.id.clone(),
            participant_name: participant.name.clone(),
            participant_email: participant.email.clone(),
            timestamp,
            scanned: false,
            scan_timestamp: None,
            attendance_method: None,
        }
    }

    /// Whether this record belongs to the given event and participant.
    pub fn matches(&self, event_id: i64, participant_id: &str) -> bool {
        self.event_id == event_id && self.participant_id == participant_id
    }

    /// `scan_timestamp` must be present exactly when `scanned` is set.
    pub fn is_consistent(&self) -> bool {
        self.scanned == self.scan_timestamp.is_some()
    }

    /// Records a QR scan. Returns `false` without touching the record if it
    /// was already scanned.
    pub fn record_scan(&mut self, at: DateTime<Utc>) -> bool {
        if self.scanned {
            return false;
        }
        self.scanned = true;
        self.scan_timestamp = Some(at);
        self.attendance_method = Some(AttendanceMethod::QrScan);
        true
    }

    /// Host override. Marking present keeps an existing scan time; marking
    /// absent clears it. Returns whether anything changed.
    pub fn set_attended(&mut self, attended: bool, at: DateTime<Utc>) -> bool {
        let changed = self.scanned != attended;
        self.scanned = attended;
        self.scan_timestamp = if attended {
            Some(self.scan_timestamp.unwrap_or(at))
        } else {
            None
        };
        self.attendance_method = Some(AttendanceMethod::Manual);
        changed
    }
}

fn seed_time(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

/// Records used when local storage holds nothing usable.
pub fn seed_registrations() -> Vec<Registration> {
    vec![Registration {
        registration_id: format!("{}-1-1-20240920", DEFAULT_NAMESPACE),
        event_id: 1,
        participant_id: "1".to_string(),
        participant_name: "Demo User".to_string(),
        participant_email: "demo@example.com".to_string(),
        timestamp: seed_time(2024, 9, 20, 10, 30),
        scanned: true,
        scan_timestamp: Some(seed_time(2024, 9, 28, 9, 15)),
        attendance_method: Some(AttendanceMethod::QrScan),
    }]
}
