//! Attendance marker.
//!
//! Decides whether a scanned code admits a participant to the event being
//! checked in, and records the admission.

use std::sync::Arc;

use thiserror::Error;

use crate::models::Registration;
use crate::services::registration_store::{MarkError, RegistrationStore};

/// Why a scanned code was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("Invalid QR code. This doesn't match any registration.")]
    NotFound,

    #[error("This QR code is for a different event (event {0})")]
    WrongEvent(i64),

    #[error("{name} was already scanned at {at}")]
    AlreadyScanned { name: String, at: String },

    #[error("Could not save attendance: {0}")]
    Storage(String),
}

impl Rejection {
    fn already_scanned(registration: &Registration) -> Self {
        Rejection::AlreadyScanned {
            name: registration.participant_name.clone(),
            at: registration
                .scan_timestamp
                .map(shared::time::display)
                .unwrap_or_else(|| "an unknown time".to_string()),
        }
    }
}

impl From<MarkError> for Rejection {
    fn from(err: MarkError) -> Self {
        match err {
            MarkError::NotFound(_) => Rejection::NotFound,
            MarkError::AlreadyScanned(registration) => Rejection::already_scanned(&registration),
            MarkError::Storage(e) => Rejection::Storage(e.to_string()),
        }
    }
}

/// Checks scanned codes in against one store.
#[derive(Clone)]
pub struct AttendanceMarker {
    store: Arc<RegistrationStore>,
}

impl AttendanceMarker {
    pub fn new(store: Arc<RegistrationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RegistrationStore> {
        &self.store
    }

    /// Classifies a scanned code for `event_id` without changing anything.
    pub fn evaluate(&self, payload_text: &str, event_id: i64) -> Result<Registration, Rejection> {
        let registration = self.store.validate(payload_text).ok_or(Rejection::NotFound)?;
        if registration.event_id != event_id {
            return Err(Rejection::WrongEvent(registration.event_id));
        }
        if registration.scanned {
            return Err(Rejection::already_scanned(&registration));
        }
        Ok(registration)
    }

    /// Admits a participant locally. The remote call is queued.
    pub fn check_in(&self, payload_text: &str, event_id: i64) -> Result<Registration, Rejection> {
        let result = self
            .evaluate(payload_text, event_id)
            .and_then(|registration| {
                let stored = self
                    .store
                    .adopt(registration)
                    .map_err(|e| Rejection::Storage(e.to_string()))?;
                Ok(self.store.mark_scanned_local(&stored.registration_id)?)
            });

        match &result {
            Ok(registration) => tracing::info!(
                event_id,
                registration_id = %registration.registration_id,
                "Participant checked in"
            ),
            Err(rejection) => tracing::info!(event_id, reason = %rejection, "Check-in rejected"),
        }
        result
    }

    /// Admits a participant and then delivers queued remote calls.
    pub async fn check_in_and_sync(
        &self,
        payload_text: &str,
        event_id: i64,
    ) -> Result<Registration, Rejection> {
        let registration = self.check_in(payload_text, event_id)?;
        self.store.reconcile().await;
        Ok(registration)
    }
}
