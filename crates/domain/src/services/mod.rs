//! Domain services for the registration core.
//!
//! Services contain business logic that operates on domain models.

pub mod attendance;
pub mod qr_codec;
pub mod registration_store;
pub mod scanner;

pub use attendance::{AttendanceMarker, Rejection};
pub use qr_codec::{parse_registration_id, CodecError, DecodeError, QrCodec, RegistrationIdParts};
pub use registration_store::{
    MarkError, ReconcileReport, RefreshReport, RegistrationError, RegistrationStore,
};
pub use scanner::{
    Feedback, ScanOutcome, ScanState, ScannerSession, CAMERA_UNAVAILABLE_MESSAGE,
    CHECKSUM_MESSAGE, FORMAT_MESSAGE,
};
