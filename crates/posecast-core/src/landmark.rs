//! Landmarks, detections and the fixed-shape landmark vector

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::{PosecastError, PosecastResult};

/// Number of tracked body landmarks
pub const LANDMARK_COUNT: usize = 33;

/// Scalars per landmark (x, y, z)
pub const COORDS_PER_LANDMARK: usize = 3;

/// Scalars in a landmark vector
pub const SCALAR_COUNT: usize = LANDMARK_COUNT * COORDS_PER_LANDMARK;

/// Minimum confidence for a detection to replace the retained value
pub const VISIBILITY_THRESHOLD: f32 = 0.5;

/// Scale applied to normalized x and z before publishing
pub const COORDINATE_SCALE: f64 = 1000.0;

/// Body landmark in pose-model index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    Nose,
    LeftEyeInner,
    LeftEye,
    LeftEyeOuter,
    RightEyeInner,
    RightEye,
    RightEyeOuter,
    LeftEar,
    RightEar,
    MouthLeft,
    MouthRight,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftPinky,
    RightPinky,
    LeftIndex,
    RightIndex,
    LeftThumb,
    RightThumb,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
    LeftHeel,
    RightHeel,
    LeftFootIndex,
    RightFootIndex,
}

impl Landmark {
    /// All landmarks in index order
    pub fn all() -> &'static [Landmark; LANDMARK_COUNT] {
        &[
            Landmark::Nose,
            Landmark::LeftEyeInner,
            Landmark::LeftEye,
            Landmark::LeftEyeOuter,
            Landmark::RightEyeInner,
            Landmark::RightEye,
            Landmark::RightEyeOuter,
            Landmark::LeftEar,
            Landmark::RightEar,
            Landmark::MouthLeft,
            Landmark::MouthRight,
            Landmark::LeftShoulder,
            Landmark::RightShoulder,
            Landmark::LeftElbow,
            Landmark::RightElbow,
            Landmark::LeftWrist,
            Landmark::RightWrist,
            Landmark::LeftPinky,
            Landmark::RightPinky,
            Landmark::LeftIndex,
            Landmark::RightIndex,
            Landmark::LeftThumb,
            Landmark::RightThumb,
            Landmark::LeftHip,
            Landmark::RightHip,
            Landmark::LeftKnee,
            Landmark::RightKnee,
            Landmark::LeftAnkle,
            Landmark::RightAnkle,
            Landmark::LeftHeel,
            Landmark::RightHeel,
            Landmark::LeftFootIndex,
            Landmark::RightFootIndex,
        ]
    }

    pub fn from_index(index: usize) -> Option<Landmark> {
        Self::all().get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Offset of this landmark's x scalar in the landmark vector
    pub fn offset(self) -> usize {
        self.index() * COORDS_PER_LANDMARK
    }
}

/// One landmark estimate produced by the pose estimator for a frame
///
/// Positions are normalized image coordinates at model precision.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Detection {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(alias = "visibility")]
    pub confidence: f32,
}

impl Detection {
    pub fn new(index: usize, x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            index,
            x,
            y,
            z,
            confidence,
        }
    }

    pub fn landmark(&self) -> Option<Landmark> {
        Landmark::from_index(self.index)
    }

    /// Whether the detection is confident enough to replace the retained value
    pub fn is_visible(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// One published coordinate
///
/// Seeded scalars keep the seed asset's text verbatim. Measured scalars
/// always render with exactly two fractional digits.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Seeded(Arc<str>),
    Measured(f64),
}

impl Scalar {
    pub fn is_seeded(&self) -> bool {
        matches!(self, Scalar::Seeded(_))
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Seeded(text) => f.write_str(text),
            Scalar::Measured(value) => write!(f, "{:.2}", value),
        }
    }
}

/// Fixed-shape vector of 33 landmark triples
///
/// INVARIANT: always exactly `SCALAR_COUNT` scalars, never resized
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkVector {
    scalars: [Scalar; SCALAR_COUNT],
}

impl LandmarkVector {
    /// Build a vector from exactly `SCALAR_COUNT` scalars
    pub fn from_scalars(scalars: Vec<Scalar>) -> PosecastResult<Self> {
        let actual = scalars.len();
        let scalars: [Scalar; SCALAR_COUNT] =
            scalars
                .try_into()
                .map_err(|_| PosecastError::ScalarCount {
                    expected: SCALAR_COUNT,
                    actual,
                })?;
        Ok(Self { scalars })
    }

    pub fn scalars(&self) -> &[Scalar; SCALAR_COUNT] {
        &self.scalars
    }

    /// Number of scalars; always `SCALAR_COUNT`
    pub fn len(&self) -> usize {
        self.scalars.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// The (x, y, z) triple for a landmark index
    pub fn triple(&self, index: usize) -> Option<&[Scalar]> {
        let start = index.checked_mul(COORDS_PER_LANDMARK)?;
        self.scalars.get(start..start + COORDS_PER_LANDMARK)
    }

    /// Overwrite one landmark with measured values
    pub fn set_measured(&mut self, landmark: Landmark, x: f64, y: f64, z: f64) {
        let offset = landmark.offset();
        self.scalars[offset] = Scalar::Measured(x);
        self.scalars[offset + 1] = Scalar::Measured(y);
        self.scalars[offset + 2] = Scalar::Measured(z);
    }

    /// Number of landmarks still carrying seed values
    pub fn seeded_landmarks(&self) -> usize {
        self.scalars
            .chunks(COORDS_PER_LANDMARK)
            .filter(|triple| triple.iter().any(Scalar::is_seeded))
            .count()
    }
}
