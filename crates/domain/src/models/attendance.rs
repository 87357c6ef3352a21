//! Attendance export rows and per-event statistics.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::registration::{AttendanceMethod, Registration};

/// One exported line of an event's attendance sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AttendanceRow {
    pub participant_name: String,
    pub participant_email: String,
    pub registration_id: String,
    pub attended: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_time: Option<DateTime<Utc>>,
    pub method: AttendanceMethod,
}

impl From<&Registration> for AttendanceRow {
    fn from(registration: &Registration) -> Self {
        Self {
            participant_name: registration.participant_name.clone(),
            participant_email: registration.participant_email.clone(),
            registration_id: registration.registration_id.clone(),
            attended: registration.scanned,
            attendance_time: registration.scan_timestamp,
            method: registration
                .attendance_method
                .unwrap_or(AttendanceMethod::QrScan),
        }
    }
}

/// Headcount for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AttendanceStats {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    /// Rounded to the nearest whole percent; zero when nobody registered.
    pub percentage: u32,
}

impl AttendanceStats {
    pub fn from_registrations<'a>(registrations: impl IntoIterator<Item = &'a Registration>) -> Self {
        let (total, present) = registrations
            .into_iter()
            .fold((0usize, 0usize), |(total, present), reg| {
                (total + 1, present + usize::from(reg.scanned))
            });
        let percentage = if total == 0 {
            0
        } else {
            ((present * 100 + total / 2) / total) as u32
        };
        Self {
            total,
            present,
            absent: total - present,
            percentage,
        }
    }
}
