//! Domain models for the Club Portal registration core.

pub mod attendance;
pub mod qr_payload;
pub mod registration;
pub mod remote;
pub mod sync;

pub use attendance::{AttendanceRow, AttendanceStats};
pub use qr_payload::{QrPayload, ScannedPayload};
pub use registration::{
    seed_registrations, AttendanceMethod, Participant, Registration, DEFAULT_NAMESPACE,
};
pub use remote::{
    AttendanceRequest, EventSummary, FlexibleId, RegisterRequest, RemoteRecordError,
    RemoteRegistration,
};
pub use sync::PendingSync;
