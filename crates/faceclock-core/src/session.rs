//! Register and Mark Attendance sessions, driven frame by frame.
//!
//! The face model, the frame source and the preview sink are passed in by
//! the caller. A session never touches a camera or a store itself: the
//! registration session hands back the collected embeddings, and the
//! attendance scan hands back the first authoritative match.

use crate::liveness::{self, DEFAULT_EAR_THRESHOLD};
use crate::matcher::{CosineMatcher, Match, Matcher, DEFAULT_MATCH_THRESHOLD};
use crate::types::{Embedding, FaceSample, KnownFaces};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceModelError {
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("face model error: {0}")]
    Model(#[from] FaceModelError),
    #[error("frame source ended after {frames} frames")]
    Exhausted { frames: usize },
}

/// External face detector + embedder.
pub trait FaceModel {
    type Frame;

    /// Detect the face in `frame` and compute its embedding and landmarks.
    ///
    /// Returns `Ok(None)` when zero or more than one face is visible; such
    /// frames are skipped by the sessions.
    fn detect_and_embed(&mut self, frame: &Self::Frame) -> Result<Option<FaceSample>, FaceModelError>;
}

/// What a session is doing, for preview rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Collecting { collected: usize, required: usize },
    Scanning { frames: usize, blinked: bool },
}

/// Operator preview. Side-effect only.
pub trait FrameSink<F> {
    fn show(&mut self, frame: &F, status: &SessionStatus);
}

impl<F> FrameSink<F> for () {
    fn show(&mut self, _frame: &F, _status: &SessionStatus) {}
}

// ── Registration ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Collecting { collected: usize, required: usize },
    Complete,
}

/// Collects embeddings until `required` samples have been seen.
#[derive(Debug)]
pub struct Registration {
    required: usize,
    samples: Vec<Embedding>,
}

impl Registration {
    pub fn new(required: usize) -> Self {
        let required = required.max(1);
        Self {
            required,
            samples: Vec::with_capacity(required),
        }
    }

    /// Feed one frame's detection result. Frames without a usable face leave
    /// the state unchanged; samples past completion are ignored.
    pub fn observe(&mut self, sample: Option<&FaceSample>) -> RegistrationState {
        if let Some(sample) = sample {
            if self.samples.len() < self.required {
                self.samples.push(sample.embedding.clone());
            }
        }
        self.state()
    }

    pub fn state(&self) -> RegistrationState {
        if self.samples.len() >= self.required {
            RegistrationState::Complete
        } else {
            RegistrationState::Collecting {
                collected: self.samples.len(),
                required: self.required,
            }
        }
    }

    pub fn into_samples(self) -> Vec<Embedding> {
        self.samples
    }
}

// ── Attendance scan ───────────────────────────────────────────────────────────

/// Thresholds and limits for an attendance scan.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    pub match_threshold: f32,
    pub ear_threshold: f32,
    /// Stop after this many frames. `None` scans until the source ends.
    pub max_frames: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            ear_threshold: DEFAULT_EAR_THRESHOLD,
            max_frames: None,
        }
    }
}

/// Looks for a face match that follows a blink.
///
/// The blink flag is sticky: once any frame shows closed eyes, every later
/// frame's match is accepted for the rest of the scan, even though the blink
/// and the match need not come from the same frame.
#[derive(Debug)]
pub struct AttendanceScan {
    match_threshold: f32,
    ear_threshold: f32,
    blinked: bool,
    frames: usize,
}

impl AttendanceScan {
    pub fn new(config: &ScanConfig) -> Self {
        Self {
            match_threshold: config.match_threshold,
            ear_threshold: config.ear_threshold,
            blinked: false,
            frames: 0,
        }
    }

    pub fn blinked(&self) -> bool {
        self.blinked
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus::Scanning {
            frames: self.frames,
            blinked: self.blinked,
        }
    }

    /// Feed one frame's detection result. Returns the first match in store
    /// order once a blink has been seen.
    pub fn observe(&mut self, sample: Option<&FaceSample>, gallery: &KnownFaces) -> Option<Match> {
        self.frames += 1;
        let sample = sample?;

        let blink = liveness::check_blink(&sample.landmarks, self.ear_threshold);
        tracing::debug!(ear = blink.avg_ear, blinking = blink.is_blinking, "liveness");
        if blink.is_blinking && !self.blinked {
            tracing::info!(ear = blink.avg_ear, "blink detected");
            self.blinked = true;
        }

        let first = CosineMatcher
            .match_all(&sample.embedding, gallery, self.match_threshold)
            .into_iter()
            .next()?;

        if self.blinked {
            Some(first)
        } else {
            tracing::debug!(user = %first.name, distance = first.distance, "match held until blink");
            None
        }
    }
}

// ── Drivers ───────────────────────────────────────────────────────────────────

/// Run a registration over `frames` until `required` samples are collected.
pub fn run_registration<I, M, S>(
    frames: I,
    model: &mut M,
    sink: &mut S,
    required: usize,
    max_frames: Option<usize>,
) -> Result<Vec<Embedding>, SessionError>
where
    I: IntoIterator<Item = M::Frame>,
    M: FaceModel,
    S: FrameSink<M::Frame>,
{
    let mut registration = Registration::new(required);
    let mut seen = 0usize;

    for frame in frames {
        if max_frames.is_some_and(|max| seen >= max) {
            break;
        }
        seen += 1;

        let sample = model.detect_and_embed(&frame)?;
        if sample.is_none() {
            tracing::debug!(frame = seen, "no single face, skipping frame");
        }

        let state = registration.observe(sample.as_ref());
        match state {
            RegistrationState::Collecting { collected, required } => {
                sink.show(&frame, &SessionStatus::Collecting { collected, required });
            }
            RegistrationState::Complete => {
                let required = registration.required;
                sink.show(
                    &frame,
                    &SessionStatus::Collecting {
                        collected: required,
                        required,
                    },
                );
                tracing::info!(frames = seen, samples = required, "registration samples collected");
                return Ok(registration.into_samples());
            }
        }
    }

    Err(SessionError::Exhausted { frames: seen })
}

/// Run an attendance scan over `frames` until a live match is found.
pub fn run_attendance_scan<I, M, S>(
    frames: I,
    model: &mut M,
    sink: &mut S,
    gallery: &KnownFaces,
    config: &ScanConfig,
) -> Result<Match, SessionError>
where
    I: IntoIterator<Item = M::Frame>,
    M: FaceModel,
    S: FrameSink<M::Frame>,
{
    let mut scan = AttendanceScan::new(config);
    let mut seen = 0usize;

    for frame in frames {
        if config.max_frames.is_some_and(|max| seen >= max) {
            break;
        }
        seen += 1;

        let sample = model.detect_and_embed(&frame)?;
        if let Some(found) = scan.observe(sample.as_ref(), gallery) {
            tracing::info!(user = %found.name, distance = found.distance, frames = seen, "live match");
            return Ok(found);
        }
        sink.show(&frame, &scan.status());
    }

    Err(SessionError::Exhausted { frames: seen })
}
