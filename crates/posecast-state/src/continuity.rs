//! Continuity buffer - merges per-frame detections into the current vector

use posecast_core::{
    Detection, LandmarkVector, SeedPose, COORDINATE_SCALE, VISIBILITY_THRESHOLD,
};

/// Result of merging one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No detections: the vector was not touched
    Retained,
    /// Detections present: the vector was rebuilt from a copy
    Updated { accepted: usize, rejected: usize },
}

/// Merge totals for a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContinuityStats {
    pub frames: u64,
    pub retained_frames: u64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Owner of the current landmark vector for one session
pub struct ContinuityBuffer {
    current: LandmarkVector,
    threshold: f32,
    stats: ContinuityStats,
}

impl ContinuityBuffer {
    /// Create a buffer seeded with a reference pose
    pub fn new(seed: SeedPose) -> Self {
        Self::with_threshold(seed, VISIBILITY_THRESHOLD)
    }

    pub fn with_threshold(seed: SeedPose, threshold: f32) -> Self {
        ContinuityBuffer {
            current: seed.into_vector(),
            threshold,
            stats: ContinuityStats::default(),
        }
    }

    /// The vector to publish for the current frame
    pub fn current(&self) -> &LandmarkVector {
        &self.current
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn stats(&self) -> &ContinuityStats {
        &self.stats
    }

    /// Merge one frame's detections
    ///
    /// With no detections the current vector is left as is. Otherwise a copy
    /// is updated with every visible, in-range, finite detection and replaces
    /// the current vector:
    /// - x' = x * 1000
    /// - y' = (1 - y) * frame_height
    /// - z' = z * 1000
    pub fn merge(&mut self, detections: &[Detection], frame_height: u32) -> MergeOutcome {
        self.stats.frames += 1;

        if detections.is_empty() {
            self.stats.retained_frames += 1;
            return MergeOutcome::Retained;
        }

        let height = f64::from(frame_height);
        let mut next = self.current.clone();
        let mut accepted = 0;
        let mut rejected = 0;

        for detection in detections {
            let Some(landmark) = detection.landmark() else {
                rejected += 1;
                continue;
            };
            if !detection.is_visible(self.threshold) || !detection.is_finite() {
                rejected += 1;
                continue;
            }

            let x = f64::from(detection.x) * COORDINATE_SCALE;
            let y = (1.0 - f64::from(detection.y)) * height;
            let z = f64::from(detection.z) * COORDINATE_SCALE;

            next.set_measured(landmark, x, y, z);
            accepted += 1;
        }

        self.current = next;
        self.stats.accepted += accepted as u64;
        self.stats.rejected += rejected as u64;

        MergeOutcome::Updated { accepted, rejected }
    }
}
