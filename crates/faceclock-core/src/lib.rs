//! faceclock-core — Identity matching and liveness for face attendance.
//!
//! Blink detection over 68-point landmarks, cosine-distance matching against
//! enrolled embeddings, enrollment averaging, and the frame-driven Register
//! and Mark Attendance sessions. Face detection, embedding and storage are
//! supplied by the caller.

pub mod enroll;
pub mod liveness;
pub mod matcher;
pub mod session;
pub mod types;

pub use enroll::{EnrollError, DEFAULT_MIN_SAMPLES};
pub use liveness::{is_blinking, DEFAULT_EAR_THRESHOLD};
pub use matcher::{match_all, CosineMatcher, Match, Matcher, DEFAULT_MATCH_THRESHOLD};
pub use session::{FaceModel, FaceModelError, FrameSink, ScanConfig, SessionError, SessionStatus};
pub use types::{Embedding, EnrolledUser, FaceSample, KnownFaces, Landmarks, Point};
