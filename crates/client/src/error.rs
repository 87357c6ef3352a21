use domain::ports::{CameraError, RemoteError, RenderError, StorageError};
use domain::services::{CodecError, MarkError, RegistrationError};
use thiserror::Error;

use crate::services::HttpBackendError;

/// Errors surfaced by client commands.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Http(#[from] HttpBackendError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Mark(#[from] MarkError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
