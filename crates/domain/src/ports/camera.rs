//! Camera and frame-decode port.

use thiserror::Error;

/// Why a frame produced no text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// No QR symbol in the frame.
    NotFound,
    /// A symbol was found but failed its checksum.
    Checksum,
    /// A symbol was found but its structure could not be read.
    Format,
}

/// Outcome of decoding one camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeEvent {
    Decoded(String),
    Failed(DecodeFailure),
}

/// Errors starting the camera.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

/// A camera that yields decoded frames while running.
pub trait Camera: Send {
    fn start(&mut self) -> Result<(), CameraError>;

    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Blocks until the next frame is decoded. `None` once the feed has ended.
    fn next_frame(&mut self) -> Option<DecodeEvent>;
}
