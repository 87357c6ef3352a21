//! QR symbol rendering port.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default rendered size in pixels (or modules for text renderers).
pub const DEFAULT_SYMBOL_SIZE: u32 = 200;

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    #[serde(rename = "L", alias = "low")]
    Low,
    #[serde(rename = "M", alias = "medium")]
    Medium,
    #[serde(rename = "Q", alias = "quartile")]
    Quartile,
    #[serde(rename = "H", alias = "high")]
    High,
}

impl std::str::FromStr for ErrorCorrection {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(ErrorCorrection::Low),
            "M" | "MEDIUM" => Ok(ErrorCorrection::Medium),
            "Q" | "QUARTILE" => Ok(ErrorCorrection::Quartile),
            "H" | "HIGH" => Ok(ErrorCorrection::High),
            other => Err(RenderError::InvalidOptions(format!(
                "unknown error-correction level {}",
                other
            ))),
        }
    }
}

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    pub size: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for RenderOptions {
    /// High correction keeps codes readable on phone screens and small prints.
    fn default() -> Self {
        Self {
            size: DEFAULT_SYMBOL_SIZE,
            error_correction: ErrorCorrection::High,
        }
    }
}

/// Errors raised while rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Payload does not fit in a QR symbol")]
    DataTooLong,

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// Produces a scannable symbol for a payload.
pub trait QrRenderer: Send + Sync {
    fn render(&self, payload: &str, options: &RenderOptions) -> Result<String, RenderError>;
}
