//! Ports to the collaborators the registration core depends on.
//!
//! Adapters live in the `persistence` and `club-portal-client` crates; the
//! in-memory and mock implementations here back the domain's own tests.

pub mod backend;
pub mod camera;
pub mod renderer;
pub mod storage;

pub use backend::{MockCall, MockRegistrationBackend, RegistrationBackend, RemoteError};
pub use camera::{Camera, CameraError, DecodeEvent, DecodeFailure};
pub use renderer::{ErrorCorrection, QrRenderer, RenderError, RenderOptions, DEFAULT_SYMBOL_SIZE};
pub use storage::{
    KeyValueStore, MemoryStore, StorageError, PENDING_SYNC_KEY, REGISTRATIONS_KEY,
};
