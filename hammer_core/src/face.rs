//! Landmark scoring.
//!
//! Turns one face-mesh detection into mouth and eye openness ratios and a
//! combined power score. Ratios are divided by the forehead-to-chin distance,
//! so the score does not change with distance to the camera.

use serde::{Deserialize, Serialize};

use crate::{
    config::{GameConfig, Window},
    math::remap_clamped,
    power::PowerScore,
};

// Face mesh indices (MediaPipe, 468 points; 478 with iris refinement).
pub const UPPER_LIP: usize = 13;
pub const LOWER_LIP: usize = 14;
pub const LEFT_EYE_TOP: usize = 159;
pub const LEFT_EYE_BOTTOM: usize = 145;
pub const RIGHT_EYE_TOP: usize = 386;
pub const RIGHT_EYE_BOTTOM: usize = 374;
pub const FOREHEAD: usize = 10;
pub const CHIN: usize = 152;

/// Smallest face height treated as a real detection.
pub const MIN_FACE_HEIGHT: f32 = 1e-6;

/// Number of points in a face mesh without iris refinement.
pub const FACE_MESH_POINTS: usize = 468;

/// A single landmark in normalized image coordinates. `z` is relative depth
/// and is ignored by scoring.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane.
    pub fn planar_distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// All landmarks of one detected face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LandmarkSet {
    pub points: Vec<Landmark>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Landmark>) -> Self {
        Self { points }
    }

    fn pair_distance(&self, a: usize, b: usize) -> Option<f32> {
        let pa = self.points.get(a)?;
        let pb = self.points.get(b)?;
        let d = pa.planar_distance(pb);
        d.is_finite().then_some(d)
    }
}

/// One detector result: zero or more faces, newest wins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceFrame {
    /// Capture sequence number of the video frame this came from.
    pub sequence: u64,
    pub faces: Vec<LandmarkSet>,
}

impl FaceFrame {
    pub fn no_face(sequence: u64) -> Self {
        Self {
            sequence,
            faces: Vec::new(),
        }
    }

    /// The face used for scoring. Additional faces are ignored.
    pub fn primary(&self) -> Option<&LandmarkSet> {
        self.faces.first()
    }
}

/// Openness ratios normalized by face height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMetrics {
    pub mouth_openness: f32,
    pub eye_openness: f32,
}

impl FaceMetrics {
    /// Measures a face. Returns `None` for degenerate geometry.
    pub fn measure(face: &LandmarkSet) -> Option<Self> {
        let height = face.pair_distance(FOREHEAD, CHIN)?;
        if height < MIN_FACE_HEIGHT {
            return None;
        }
        let mouth = face.pair_distance(UPPER_LIP, LOWER_LIP)?;
        let left = face.pair_distance(LEFT_EYE_TOP, LEFT_EYE_BOTTOM)?;
        let right = face.pair_distance(RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM)?;
        Some(Self {
            mouth_openness: mouth / height,
            eye_openness: (left + right) * 0.5 / height,
        })
    }
}

/// Per-frame scoring output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceScore {
    /// `None` when no usable face was present.
    pub metrics: Option<FaceMetrics>,
    pub mouth_score: f32,
    pub eye_score: f32,
    pub power: PowerScore,
}

impl FaceScore {
    pub const NONE: Self = Self {
        metrics: None,
        mouth_score: 0.0,
        eye_score: 0.0,
        power: PowerScore::ZERO,
    };
}

/// Scoring calibration: fixed windows and a convex weight pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkScorer {
    pub mouth_window: Window,
    pub eye_window: Window,
    pub mouth_weight: f32,
    pub eye_weight: f32,
}

impl Default for LandmarkScorer {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

impl LandmarkScorer {
    pub fn from_config(cfg: &GameConfig) -> Self {
        Self {
            mouth_window: cfg.mouth_window,
            eye_window: cfg.eye_window,
            mouth_weight: cfg.mouth_weight,
            eye_weight: cfg.eye_weight,
        }
    }

    pub fn mouth_score(&self, ratio: f32) -> f32 {
        remap_clamped(ratio, self.mouth_window.start, self.mouth_window.max)
    }

    pub fn eye_score(&self, ratio: f32) -> f32 {
        remap_clamped(ratio, self.eye_window.start, self.eye_window.max)
    }

    pub fn combine(&self, mouth_score: f32, eye_score: f32) -> PowerScore {
        PowerScore::new(mouth_score * self.mouth_weight + eye_score * self.eye_weight)
    }

    /// Scores a detector result. No frame, no face, or degenerate geometry
    /// all score 0.
    pub fn score(&self, frame: Option<&FaceFrame>) -> FaceScore {
        let Some(metrics) = frame
            .and_then(FaceFrame::primary)
            .and_then(FaceMetrics::measure)
        else {
            return FaceScore::NONE;
        };
        let mouth_score = self.mouth_score(metrics.mouth_openness);
        let eye_score = self.eye_score(metrics.eye_openness);
        FaceScore {
            metrics: Some(metrics),
            mouth_score,
            eye_score,
            power: self.combine(mouth_score, eye_score),
        }
    }
}

/// Builds a synthetic face mesh with the given geometry.
///
/// Only the landmarks used by scoring are placed; the rest sit at the face
/// center. Used by the simulated detector and by tests.
pub fn synthetic_face(face_height: f32, mouth_open: f32, eye_open: f32) -> LandmarkSet {
    let (cx, cy) = (0.5, 0.5);
    let top = cy - face_height * 0.5;
    let mut points = vec![Landmark::new(cx, cy, 0.0); FACE_MESH_POINTS];
    points[FOREHEAD] = Landmark::new(cx, top, 0.0);
    points[CHIN] = Landmark::new(cx, top + face_height, 0.0);

    let mouth_y = top + face_height * 0.75;
    points[UPPER_LIP] = Landmark::new(cx, mouth_y - mouth_open * 0.5, 0.0);
    points[LOWER_LIP] = Landmark::new(cx, mouth_y + mouth_open * 0.5, 0.0);

    let eye_y = top + face_height * 0.35;
    for (x, t, b) in [
        (cx - 0.08, LEFT_EYE_TOP, LEFT_EYE_BOTTOM),
        (cx + 0.08, RIGHT_EYE_TOP, RIGHT_EYE_BOTTOM),
    ] {
        points[t] = Landmark::new(x, eye_y - eye_open * 0.5, -0.01);
        points[b] = Landmark::new(x, eye_y + eye_open * 0.5, -0.01);
    }
    LandmarkSet::new(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(face: LandmarkSet) -> FaceFrame {
        FaceFrame {
            sequence: 1,
            faces: vec![face],
        }
    }

    #[test]
    fn half_open_face_scores_half() {
        let scorer = LandmarkScorer::default();
        // mouth ratio 0.175, eye ratio 0.075: both halfway through their windows.
        let s = scorer.score(Some(&frame(synthetic_face(0.5, 0.0875, 0.0375))));
        let m = s.metrics.unwrap();
        assert!((m.mouth_openness - 0.175).abs() < 1e-5);
        assert!((m.eye_openness - 0.075).abs() < 1e-5);
        assert!((s.mouth_score - 0.5).abs() < 1e-4);
        assert!((s.eye_score - 0.5).abs() < 1e-4);
        assert!((s.power.value() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn score_is_scale_invariant() {
        let scorer = LandmarkScorer::default();
        let near = scorer.score(Some(&frame(synthetic_face(0.8, 0.16, 0.064))));
        let far = scorer.score(Some(&frame(synthetic_face(0.2, 0.04, 0.016))));
        assert!((near.power.value() - far.power.value()).abs() < 1e-4);
    }

    #[test]
    fn no_face_scores_zero() {
        let scorer = LandmarkScorer::default();
        assert_eq!(scorer.score(None).power.value(), 0.0);
        assert_eq!(scorer.score(Some(&FaceFrame::no_face(3))).power.value(), 0.0);
    }

    #[test]
    fn degenerate_height_is_no_face() {
        let scorer = LandmarkScorer::default();
        let s = scorer.score(Some(&frame(synthetic_face(0.0, 0.1, 0.05))));
        assert!(s.metrics.is_none());
        assert_eq!(s.power.value(), 0.0);
    }

    #[test]
    fn truncated_mesh_is_no_face() {
        let scorer = LandmarkScorer::default();
        let mut face = synthetic_face(0.5, 0.2, 0.05);
        face.points.truncate(100);
        assert_eq!(scorer.score(Some(&frame(face))), FaceScore::NONE);
    }

    #[test]
    fn only_first_face_counts() {
        let scorer = LandmarkScorer::default();
        let f = FaceFrame {
            sequence: 9,
            faces: vec![
                synthetic_face(0.5, 0.0, 0.0),
                synthetic_face(0.5, 0.5, 0.5),
            ],
        };
        assert_eq!(scorer.score(Some(&f)).power.value(), 0.0);
    }

    #[test]
    fn mouth_thresholds_and_monotonicity() {
        let scorer = LandmarkScorer::default();
        assert_eq!(scorer.mouth_score(0.0), 0.0);
        assert_eq!(scorer.mouth_score(0.05), 0.0);
        assert_eq!(scorer.mouth_score(0.30), 1.0);
        assert_eq!(scorer.mouth_score(0.9), 1.0);
        let mut prev = 0.0;
        for i in 0..=100 {
            let s = scorer.mouth_score(i as f32 * 0.004);
            assert!(s >= prev);
            prev = s;
        }
    }

    #[test]
    fn eye_thresholds() {
        let scorer = LandmarkScorer::default();
        assert_eq!(scorer.eye_score(0.05), 0.0);
        assert_eq!(scorer.eye_score(0.02), 0.0);
        assert_eq!(scorer.eye_score(0.10), 1.0);
        assert_eq!(scorer.eye_score(0.2), 1.0);
    }

    #[test]
    fn combination_is_fixed_convex() {
        let scorer = LandmarkScorer::default();
        for (m, e) in [(0.0, 1.0), (1.0, 0.0), (0.25, 0.75), (1.0, 1.0)] {
            let expected = 0.7 * m + 0.3 * e;
            assert!((scorer.combine(m, e).value() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn score_stays_in_unit_range() {
        let scorer = LandmarkScorer::default();
        for h in [0.01, 0.1, 0.5, 1.0] {
            for m in [0.0, 0.01, 0.1, 0.5, 2.0] {
                for e in [0.0, 0.02, 0.08, 1.0] {
                    let s = scorer.score(Some(&frame(synthetic_face(h, m * h, e * h))));
                    let v = s.power.value();
                    assert!((0.0..=1.0).contains(&v), "score {v} out of range");
                }
            }
        }
    }
}
