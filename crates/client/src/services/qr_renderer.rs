//! QR symbol rendering with the `qrcode` crate.

use std::str::FromStr;

use domain::ports::{ErrorCorrection, QrRenderer, RenderError, RenderOptions};
use qrcode::render::{svg, unicode};
use qrcode::types::QrError;
use qrcode::{EcLevel, QrCode};

/// Output format of rendered symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SymbolFormat {
    /// Half-block characters for terminals. `size` is ignored; one module
    /// maps to one character column.
    #[default]
    Text,
    /// SVG document at least `size` pixels square.
    Svg,
}

impl FromStr for SymbolFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "terminal" => Ok(SymbolFormat::Text),
            "svg" => Ok(SymbolFormat::Svg),
            other => Err(RenderError::InvalidOptions(format!(
                "unknown symbol format {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QrCodeRenderer {
    format: SymbolFormat,
}

impl QrCodeRenderer {
    pub fn new(format: SymbolFormat) -> Self {
        Self { format }
    }
}

fn ec_level(level: ErrorCorrection) -> EcLevel {
    match level {
        ErrorCorrection::Low => EcLevel::L,
        ErrorCorrection::Medium => EcLevel::M,
        ErrorCorrection::Quartile => EcLevel::Q,
        ErrorCorrection::High => EcLevel::H,
    }
}

impl QrRenderer for QrCodeRenderer {
    fn render(&self, payload: &str, options: &RenderOptions) -> Result<String, RenderError> {
        if options.size == 0 {
            return Err(RenderError::InvalidOptions("size must be positive".to_string()));
        }

        let code = QrCode::with_error_correction_level(payload, ec_level(options.error_correction))
            .map_err(|e| match e {
                QrError::DataTooLong => RenderError::DataTooLong,
                other => RenderError::Failed(other.to_string()),
            })?;

        let rendered = match self.format {
            SymbolFormat::Text => code
                .render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .build(),
            SymbolFormat::Svg => code
                .render::<svg::Color<'_>>()
                .min_dimensions(options.size, options.size)
                .build(),
        };
        tracing::debug!(
            format = ?self.format,
            version = ?code.version(),
            "Rendered QR symbol"
        );
        Ok(rendered)
    }
}
