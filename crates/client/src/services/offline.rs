//! Backend used when remote sync is switched off.

use async_trait::async_trait;
use domain::models::{AttendanceRequest, EventSummary, RegisterRequest, RemoteRegistration};
use domain::ports::{RegistrationBackend, RemoteError};

/// Refuses every call, so all remote work stays queued locally.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineBackend;

#[async_trait]
impl RegistrationBackend for OfflineBackend {
    async fn register(&self, _event_id: i64, _request: &RegisterRequest) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn mark_attendance(
        &self,
        _event_id: i64,
        _request: &AttendanceRequest,
    ) -> Result<(), RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn fetch_registrations(&self) -> Result<Vec<RemoteRegistration>, RemoteError> {
        Err(RemoteError::Disabled)
    }

    async fn fetch_events(&self) -> Result<Vec<EventSummary>, RemoteError> {
        Err(RemoteError::Disabled)
    }
}
