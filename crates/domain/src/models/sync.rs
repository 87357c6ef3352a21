//! Remote calls waiting for the reconciliation pass.

use serde::{Deserialize, Serialize};

use super::registration::Registration;

/// A remote call that failed and will be retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingSync {
    Register {
        event_id: i64,
        participant_id: String,
        registration_id: String,
    },
    Attendance {
        event_id: i64,
        participant_id: String,
        registration_id: String,
    },
}

impl PendingSync {
    pub fn register(registration: &Registration) -> Self {
        PendingSync::Register {
            event_id: registration.event_id,
            participant_id: registration.participant_id.clone(),
            registration_id: registration.registration_id.clone(),
        }
    }

    pub fn attendance(registration: &Registration) -> Self {
        PendingSync::Attendance {
            event_id: registration.event_id,
            participant_id: registration.participant_id.clone(),
            registration_id: registration.registration_id.clone(),
        }
    }

    pub fn registration_id(&self) -> &str {
        match self {
            PendingSync::Register { registration_id, .. }
            | PendingSync::Attendance { registration_id, .. } => registration_id,
        }
    }

    pub fn event_id(&self) -> i64 {
        match self {
            PendingSync::Register { event_id, .. } | PendingSync::Attendance { event_id, .. } => {
                *event_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PendingSync::Register { .. } => "register",
            PendingSync::Attendance { .. } => "attendance",
        }
    }
}
