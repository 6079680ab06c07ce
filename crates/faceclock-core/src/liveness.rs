//! Blink-based liveness gate using the eye aspect ratio (EAR).
//!
//! Each eye in the 68-point scheme is outlined by six points, p1..p6, running
//! clockwise from the outer corner. The ratio of the two vertical spans to the
//! horizontal span collapses towards zero as the lid closes:
//!
//! ```text
//! EAR = (|p2 - p6| + |p3 - p5|) / (2 * |p1 - p4|)
//! ```
//!
//! An open eye sits around 0.25–0.35; a closed eye drops below 0.2.
//!
//! This is a single-frame threshold test. It cannot tell a closed eye from a
//! blink caught mid-frame, and it carries no state between frames.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs with open eyes.
//! - **Does not block:** Video replay, photographs with closed eyes, masks.

use crate::types::{Landmarks, Point};

/// Average EAR strictly below this value counts as a blink.
pub const DEFAULT_EAR_THRESHOLD: f32 = 0.21;

/// First index of the left-eye subset {36..41}.
const LEFT_EYE_START: usize = 36;
/// First index of the right-eye subset {42..47}.
const RIGHT_EYE_START: usize = 42;

/// Per-frame blink measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkResult {
    pub left_ear: f32,
    pub right_ear: f32,
    /// Mean of both eyes.
    pub avg_ear: f32,
    /// Whether `avg_ear` fell below the threshold.
    pub is_blinking: bool,
}

/// Eye aspect ratio of six ordered eye points.
///
/// A zero horizontal span (degenerate detection) yields 0.0 rather than
/// NaN or infinity.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> f32 {
    let a = distance(eye[1], eye[5]);
    let b = distance(eye[2], eye[4]);
    let c = distance(eye[0], eye[3]);

    if c > 0.0 {
        (a + b) / (2.0 * c)
    } else {
        0.0
    }
}

/// Mean EAR of both eyes.
pub fn average_ear(landmarks: &Landmarks) -> f32 {
    check_blink(landmarks, DEFAULT_EAR_THRESHOLD).avg_ear
}

/// Measure both eyes and compare the mean EAR against `threshold`.
pub fn check_blink(landmarks: &Landmarks, threshold: f32) -> BlinkResult {
    let left_ear = eye_aspect_ratio(&landmarks.eye(LEFT_EYE_START));
    let right_ear = eye_aspect_ratio(&landmarks.eye(RIGHT_EYE_START));
    let avg_ear = (left_ear + right_ear) / 2.0;

    BlinkResult {
        left_ear,
        right_ear,
        avg_ear,
        is_blinking: avg_ear < threshold,
    }
}

/// True iff the mean EAR is below [`DEFAULT_EAR_THRESHOLD`].
pub fn is_blinking(landmarks: &Landmarks) -> bool {
    check_blink(landmarks, DEFAULT_EAR_THRESHOLD).is_blinking
}

fn distance(p: Point, q: Point) -> f32 {
    (p.0 - q.0).hypot(p.1 - q.1)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::LANDMARK_COUNT;

    /// Six eye points with horizontal span `width` and vertical span `height`,
    /// so that EAR = height / width exactly.
    fn eye_points(x0: f32, y0: f32, width: f32, height: f32) -> [Point; 6] {
        let third = width / 3.0;
        let half = height / 2.0;
        [
            (x0, y0),
            (x0 + third, y0 - half),
            (x0 + 2.0 * third, y0 - half),
            (x0 + width, y0),
            (x0 + 2.0 * third, y0 + half),
            (x0 + third, y0 + half),
        ]
    }

    /// A 68-point face whose eyes have the given height/width ratios.
    pub(crate) fn face_with_eyes(left: (f32, f32), right: (f32, f32)) -> Landmarks {
        let mut points = vec![(0.0, 0.0); LANDMARK_COUNT];
        let l = eye_points(200.0, 100.0, left.0, left.1);
        let r = eye_points(400.0, 100.0, right.0, right.1);
        points[LEFT_EYE_START..LEFT_EYE_START + 6].copy_from_slice(&l);
        points[RIGHT_EYE_START..RIGHT_EYE_START + 6].copy_from_slice(&r);
        Landmarks::try_from(points).unwrap()
    }

    pub(crate) fn open_eyes() -> Landmarks {
        face_with_eyes((30.0, 9.0), (30.0, 9.0))
    }

    pub(crate) fn closed_eyes() -> Landmarks {
        face_with_eyes((30.0, 3.0), (30.0, 3.0))
    }

    #[test]
    fn test_ear_matches_aspect_ratio() {
        let eye = eye_points(0.0, 0.0, 40.0, 12.0);
        assert!((eye_aspect_ratio(&eye) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_ear_zero_width_is_closed() {
        let eye = [(5.0, 5.0); 6];
        assert_eq!(eye_aspect_ratio(&eye), 0.0);
    }

    #[test]
    fn test_open_eyes_not_blinking() {
        let result = check_blink(&open_eyes(), DEFAULT_EAR_THRESHOLD);
        assert!((result.avg_ear - 0.3).abs() < 1e-6);
        assert!(!result.is_blinking);
        assert!(!is_blinking(&open_eyes()));
    }

    #[test]
    fn test_closed_eyes_blinking() {
        let result = check_blink(&closed_eyes(), DEFAULT_EAR_THRESHOLD);
        assert!((result.avg_ear - 0.1).abs() < 1e-6);
        assert!(result.is_blinking);
        assert!(is_blinking(&closed_eyes()));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 21 / 100 == 0.21 exactly in the EAR computation
        let face = face_with_eyes((100.0, 21.0), (100.0, 21.0));
        assert_eq!(average_ear(&face), DEFAULT_EAR_THRESHOLD);
        assert!(!is_blinking(&face));
    }

    #[test]
    fn test_average_of_both_eyes() {
        // One eye shut (0.1), one wide open (0.4): mean 0.25, not a blink
        let face = face_with_eyes((30.0, 3.0), (30.0, 12.0));
        let result = check_blink(&face, DEFAULT_EAR_THRESHOLD);
        assert!((result.left_ear - 0.1).abs() < 1e-6);
        assert!((result.right_ear - 0.4).abs() < 1e-6);
        assert!((result.avg_ear - 0.25).abs() < 1e-6);
        assert!(!result.is_blinking);
    }

    #[test]
    fn test_custom_threshold() {
        let result = check_blink(&open_eyes(), 0.35);
        assert!(result.is_blinking);
    }
}
