//! Seed pose - the reference landmark vector used before any detection
//!
//! The seed is a versioned asset, not a computed value. Its text is kept
//! verbatim so that never-detected landmarks publish byte-identically
//! across implementations.

use std::path::Path;
use std::sync::Arc;

use crate::{
    Landmark, LandmarkVector, PosecastError, PosecastResult, Scalar, COORDS_PER_LANDMARK, LANDMARK_COUNT,
};

/// Version of the embedded default pose asset
pub const DEFAULT_POSE_VERSION: u32 = 1;

const DEFAULT_POSE_V1: &str = include_str!("../assets/default_pose_v1.txt");

/// Seed pose loaded from an asset
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPose {
    vector: LandmarkVector,
}

impl SeedPose {
    /// The embedded default pose
    pub fn builtin() -> PosecastResult<Self> {
        Self::parse(DEFAULT_POSE_V1)
    }

    /// Load a seed pose asset from disk
    pub fn from_file(path: &Path) -> PosecastResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PosecastError::InvalidSeed(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }

    /// Parse asset text: one `x,y,z` line per landmark, `#` comments allowed
    pub fn parse(text: &str) -> PosecastResult<Self> {
        let mut scalars = Vec::with_capacity(LANDMARK_COUNT * COORDS_PER_LANDMARK);

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some(landmark) = Landmark::from_index(scalars.len() / COORDS_PER_LANDMARK) else {
                return Err(PosecastError::InvalidSeed(format!(
                    "line {}: more than {} landmarks",
                    line_no + 1,
                    LANDMARK_COUNT
                )));
            };

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != COORDS_PER_LANDMARK {
                return Err(PosecastError::InvalidSeed(format!(
                    "line {} ({:?}): expected {} values, got {}",
                    line_no + 1,
                    landmark,
                    COORDS_PER_LANDMARK,
                    fields.len()
                )));
            }

            for field in fields {
                if !is_decimal(field) {
                    return Err(PosecastError::InvalidSeed(format!(
                        "line {} ({:?}): not a decimal value: {:?}",
                        line_no + 1,
                        landmark,
                        field
                    )));
                }
                scalars.push(Scalar::Seeded(Arc::from(field)));
            }
        }

        if scalars.len() != LANDMARK_COUNT * COORDS_PER_LANDMARK {
            return Err(PosecastError::InvalidSeed(format!(
                "expected {} landmarks, got {}",
                LANDMARK_COUNT,
                scalars.len() / COORDS_PER_LANDMARK
            )));
        }

        Ok(SeedPose {
            vector: LandmarkVector::from_scalars(scalars)?,
        })
    }

    pub fn vector(&self) -> &LandmarkVector {
        &self.vector
    }

    pub fn into_vector(self) -> LandmarkVector {
        self.vector
    }
}

/// Plain decimal text: optional sign, digits, optional fraction
pub fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    match frac {
        Some(frac) => all_digits(int) && all_digits(frac),
        None => all_digits(int),
    }
}
