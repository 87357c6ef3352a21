//! Line-fed camera.
//!
//! Stands in for a camera plus frame decoder: every input line is one decoded
//! frame. A blank line is a frame with no symbol; `!checksum` and `!format`
//! simulate unreadable symbols.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use domain::ports::{Camera, CameraError, DecodeEvent, DecodeFailure};

/// Where frames are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSource {
    Stdin,
    File(PathBuf),
}

pub struct LineCamera {
    source: FrameSource,
    reader: Option<Box<dyn BufRead + Send>>,
    running: bool,
}

impl LineCamera {
    pub fn new(source: FrameSource) -> Self {
        Self {
            source,
            reader: None,
            running: false,
        }
    }

    /// Camera over an already open reader.
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            source: FrameSource::Stdin,
            reader: Some(Box::new(reader)),
            running: false,
        }
    }

    fn open(&self) -> Result<Box<dyn BufRead + Send>, CameraError> {
        match &self.source {
            FrameSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
            FrameSource::File(path) => {
                let file = File::open(path).map_err(|e| match e.kind() {
                    io::ErrorKind::PermissionDenied => CameraError::PermissionDenied,
                    _ => CameraError::Unavailable(format!("{}: {}", path.display(), e)),
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Maps one input line to a decode event.
pub fn parse_frame(line: &str) -> DecodeEvent {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.trim() {
        "" => DecodeEvent::Failed(DecodeFailure::NotFound),
        "!checksum" => DecodeEvent::Failed(DecodeFailure::Checksum),
        "!format" => DecodeEvent::Failed(DecodeFailure::Format),
        _ => DecodeEvent::Decoded(line.to_string()),
    }
}

impl Camera for LineCamera {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.reader.is_none() {
            self.reader = Some(self.open()?);
        }
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn next_frame(&mut self) -> Option<DecodeEvent> {
        if !self.running {
            return None;
        }
        let reader = self.reader.as_mut()?;
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(parse_frame(&line)),
            Err(e) => {
                tracing::warn!(error = %e, "Frame source failed");
                None
            }
        }
    }
}
