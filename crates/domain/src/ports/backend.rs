//! Remote registration backend port.
//!
//! Any non-2xx response or transport failure is a [`RemoteError`]; callers
//! treat every variant as "remote unavailable".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::models::{AttendanceRequest, EventSummary, RegisterRequest, RemoteRegistration};

/// Errors returned by a backend adapter.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote backend unavailable: {0}")]
    Unavailable(String),

    #[error("Remote backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response from remote backend: {0}")]
    InvalidResponse(String),

    #[error("Remote backend is disabled")]
    Disabled,
}

/// REST backend for events and registrations.
#[async_trait::async_trait]
pub trait RegistrationBackend: Send + Sync {
    /// `POST /events/{event_id}/register`.
    async fn register(&self, event_id: i64, request: &RegisterRequest) -> Result<(), RemoteError>;

    /// `POST /events/{event_id}/attendance`.
    async fn mark_attendance(
        &self,
        event_id: i64,
        request: &AttendanceRequest,
    ) -> Result<(), RemoteError>;

    /// `GET /registrations`.
    async fn fetch_registrations(&self) -> Result<Vec<RemoteRegistration>, RemoteError>;

    /// `GET /events`.
    async fn fetch_events(&self) -> Result<Vec<EventSummary>, RemoteError>;
}

/// A call observed by [`MockRegistrationBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Register {
        event_id: i64,
        request: RegisterRequest,
    },
    Attendance {
        event_id: i64,
        request: AttendanceRequest,
    },
    FetchRegistrations,
    FetchEvents,
}

/// Mock backend for testing.
#[derive(Debug, Default)]
pub struct MockRegistrationBackend {
    /// Whether to simulate failures for testing.
    simulate_failure: AtomicBool,
    calls: Mutex<Vec<MockCall>>,
    registrations: Mutex<Vec<RemoteRegistration>>,
    events: Mutex<Vec<EventSummary>>,
}

impl MockRegistrationBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock backend that simulates failures.
    pub fn failing() -> Self {
        let backend = Self::new();
        backend.set_failing(true);
        backend
    }

    /// Preload the records returned by `fetch_registrations`.
    pub fn with_registrations(self, registrations: Vec<RemoteRegistration>) -> Self {
        *self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = registrations;
        self
    }

    /// Preload the events returned by `fetch_events`.
    pub fn with_events(self, events: Vec<EventSummary>) -> Self {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = events;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.simulate_failure.store(failing, Ordering::SeqCst);
    }

    /// Every call received so far, including failed ones.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: MockCall) -> Result<(), RemoteError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        if self.simulate_failure.load(Ordering::SeqCst) {
            tracing::warn!("Mock registration backend simulating failure");
            return Err(RemoteError::Unavailable("Simulated failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RegistrationBackend for MockRegistrationBackend {
    async fn register(&self, event_id: i64, request: &RegisterRequest) -> Result<(), RemoteError> {
        self.record(MockCall::Register {
            event_id,
            request: request.clone(),
        })
    }

    async fn mark_attendance(
        &self,
        event_id: i64,
        request: &AttendanceRequest,
    ) -> Result<(), RemoteError> {
        self.record(MockCall::Attendance {
            event_id,
            request: request.clone(),
        })
    }

    async fn fetch_registrations(&self) -> Result<Vec<RemoteRegistration>, RemoteError> {
        self.record(MockCall::FetchRegistrations)?;
        Ok(self
            .registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn fetch_events(&self) -> Result<Vec<EventSummary>, RemoteError> {
        self.record(MockCall::FetchEvents)?;
        Ok(self
            .events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_success() {
        let backend = MockRegistrationBackend::new();
        let request = RegisterRequest {
            user_id: "u1".to_string(),
            registration_id: "SPARC-42-u1-20241018".to_string(),
        };

        assert!(backend.register(42, &request).await.is_ok());
        assert_eq!(
            backend.calls(),
            vec![MockCall::Register {
                event_id: 42,
                request
            }]
        );
    }

    #[tokio::test]
    async fn test_mock_backend_failure() {
        let backend = MockRegistrationBackend::failing();
        let request = AttendanceRequest {
            registration_id: "SPARC-42-u1-20241018".to_string(),
            user_id: "u1".to_string(),
        };

        let result = backend.mark_attendance(42, &request).await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        assert_eq!(backend.calls().len(), 1);
    }

    #[test]
    fn test_mock_backend_recovers() {
        let backend = MockRegistrationBackend::failing();
        assert!(tokio_test::block_on(backend.fetch_events()).is_err());
        backend.set_failing(false);
        assert!(tokio_test::block_on(backend.fetch_events()).unwrap().is_empty());
    }
}
