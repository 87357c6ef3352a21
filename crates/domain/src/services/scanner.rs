//! Scanner session.
//!
//! Drives one host's check-in screen: feeds camera frames to the attendance
//! marker and tracks what the host should see.
//!
//! ```text
//! Idle -> Scanning -> Evaluating -> Resolved(Accepted | Rejected) -> Idle
//!   \-> CameraUnavailable (until start succeeds)
//! ```

use crate::models::Registration;
use crate::ports::{Camera, CameraError, DecodeEvent, DecodeFailure};
use crate::services::attendance::{AttendanceMarker, Rejection};

pub const CHECKSUM_MESSAGE: &str = "QR code checksum error. Please try scanning again.";
pub const FORMAT_MESSAGE: &str = "Invalid QR code format. Please try a valid event QR code.";
pub const CAMERA_UNAVAILABLE_MESSAGE: &str =
    "Could not access camera. Please check permissions and try again.";

/// Final result of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Accepted(Registration),
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Evaluating,
    Resolved(ScanOutcome),
    CameraUnavailable,
}

/// What the host is shown after a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Nothing to show.
    Ignored,
    /// Short-lived hint; scanning continues.
    Transient(&'static str),
    Accepted(Registration),
    Rejected(Rejection),
}

impl Feedback {
    pub fn message(&self) -> Option<String> {
        match self {
            Feedback::Ignored => None,
            Feedback::Transient(message) => Some(message.to_string()),
            Feedback::Accepted(registration) => Some(format!(
                "Welcome, {} ({})",
                registration.participant_name, registration.participant_email
            )),
            Feedback::Rejected(rejection) => Some(rejection.to_string()),
        }
    }
}

/// One host's scanning session for an event.
pub struct ScannerSession<C: Camera> {
    camera: C,
    marker: AttendanceMarker,
    event_id: i64,
    state: ScanState,
    last_rejected: Option<String>,
}

impl<C: Camera> ScannerSession<C> {
    pub fn new(camera: C, marker: AttendanceMarker, event_id: i64) -> Self {
        Self {
            camera,
            marker,
            event_id,
            state: ScanState::Idle,
            last_rejected: None,
        }
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    pub fn marker(&self) -> &AttendanceMarker {
        &self.marker
    }

    /// Starts the camera. Also the host's retry after `CameraUnavailable`.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if let Err(e) = self.camera.start() {
            tracing::warn!(event_id = self.event_id, error = %e, "Camera could not be started");
            self.state = ScanState::CameraUnavailable;
            return Err(e);
        }
        tracing::debug!(event_id = self.event_id, "Scanner started");
        self.state = ScanState::Scanning;
        self.last_rejected = None;
        Ok(())
    }

    /// Host-driven termination.
    pub fn stop(&mut self) {
        if self.camera.is_running() {
            self.camera.stop();
        }
        self.state = ScanState::Idle;
        self.last_rejected = None;
    }

    /// Clears the last result and scans again.
    pub fn scan_another(&mut self) -> Result<(), CameraError> {
        if !self.camera.is_running() {
            return self.start();
        }
        self.state = ScanState::Scanning;
        self.last_rejected = None;
        Ok(())
    }

    /// Applies one decoded frame.
    pub fn handle(&mut self, event: DecodeEvent) -> Feedback {
        if !self.accepts_frames() {
            return Feedback::Ignored;
        }

        let text = match event {
            DecodeEvent::Failed(DecodeFailure::NotFound) => return Feedback::Ignored,
            DecodeEvent::Failed(DecodeFailure::Checksum) => {
                self.state = ScanState::Scanning;
                return Feedback::Transient(CHECKSUM_MESSAGE);
            }
            DecodeEvent::Failed(DecodeFailure::Format) => {
                self.state = ScanState::Scanning;
                return Feedback::Transient(FORMAT_MESSAGE);
            }
            DecodeEvent::Decoded(text) => text,
        };

        if self.last_rejected.as_deref() == Some(text.as_str()) {
            return Feedback::Ignored;
        }
        if let Err(e) = self.marker.store().codec().decode(&text) {
            tracing::debug!(error = %e, "Ignoring unrelated QR code");
            return Feedback::Ignored;
        }

        self.state = ScanState::Evaluating;
        match self.marker.check_in(&text, self.event_id) {
            Ok(registration) => {
                self.camera.stop();
                self.last_rejected = None;
                self.state = ScanState::Resolved(ScanOutcome::Accepted(registration.clone()));
                Feedback::Accepted(registration)
            }
            Err(rejection) => {
                self.last_rejected = Some(text);
                self.state = ScanState::Resolved(ScanOutcome::Rejected(rejection.clone()));
                Feedback::Rejected(rejection)
            }
        }
    }

    /// Pulls the next frame from the camera and applies it.
    ///
    /// Returns `None` when the camera is stopped or its feed has ended.
    pub fn next_frame(&mut self) -> Option<Feedback> {
        if !self.camera.is_running() || !self.accepts_frames() {
            return None;
        }
        let event = self.camera.next_frame()?;
        Some(self.handle(event))
    }

    fn accepts_frames(&self) -> bool {
        matches!(
            self.state,
            ScanState::Scanning | ScanState::Resolved(ScanOutcome::Rejected(_))
        )
    }
}
