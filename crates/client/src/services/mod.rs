//! Adapters for the domain ports.

pub mod http_backend;
pub mod line_camera;
pub mod offline;
pub mod qr_renderer;

pub use http_backend::{HttpBackendError, HttpRegistrationBackend};
pub use line_camera::{FrameSource, LineCamera};
pub use offline::OfflineBackend;
pub use qr_renderer::{QrCodeRenderer, SymbolFormat};
