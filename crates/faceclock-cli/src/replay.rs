//! Replay of recorded detector output.
//!
//! A capture file holds one frame per line, each frame being the faces a
//! detector reported for it:
//!
//! ```text
//! {"faces":[{"embedding":[0.01, ...],"landmarks":[[311.0,204.5], ...]}]}
//! {"faces":[]}
//! ```
//!
//! Lines are read lazily, so a capture can be a pipe fed by a live detector.

use faceclock_core::{FaceModel, FaceModelError, FaceSample};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// One undecoded line of a capture file.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// 1-based line number.
    pub line: usize,
    /// The line, or why it could not be read.
    pub text: Result<String, String>,
}

#[derive(Deserialize)]
struct CapturedFrame {
    #[serde(default)]
    faces: Vec<FaceSample>,
}

/// Frames of a capture file, in order.
///
/// A line that cannot be read is yielded once as a failed frame and ends the
/// stream.
pub struct CaptureReader<R> {
    lines: Lines<R>,
    line: usize,
    failed: bool,
}

impl CaptureReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> CaptureReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for CaptureReader<R> {
    type Item = RawFrame;

    fn next(&mut self) -> Option<RawFrame> {
        if self.failed {
            return None;
        }
        let text = self.lines.next()?.map_err(|e| {
            self.failed = true;
            tracing::warn!(line = self.line + 1, error = %e, "capture read failed");
            e.to_string()
        });
        self.line += 1;
        Some(RawFrame {
            line: self.line,
            text,
        })
    }
}

/// Face model that decodes recorded detections instead of running inference.
///
/// Like a live detector it yields a sample only when exactly one face is in
/// the frame.
pub struct ReplayModel;

impl FaceModel for ReplayModel {
    type Frame = RawFrame;

    fn detect_and_embed(&mut self, frame: &RawFrame) -> Result<Option<FaceSample>, FaceModelError> {
        let text = frame
            .text
            .as_deref()
            .map_err(|e| FaceModelError::InvalidFrame(format!("line {}: {e}", frame.line)))?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let captured: CapturedFrame = serde_json::from_str(text)
            .map_err(|e| FaceModelError::InvalidFrame(format!("line {}: {e}", frame.line)))?;

        match <[FaceSample; 1]>::try_from(captured.faces) {
            Ok([face]) => Ok(Some(face)),
            Err(faces) => {
                tracing::debug!(line = frame.line, faces = faces.len(), "ambiguous frame discarded");
                Ok(None)
            }
        }
    }
}
