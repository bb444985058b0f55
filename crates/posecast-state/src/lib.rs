//! Posecast State - Landmark continuity
//!
//! The published vector is always complete. Each frame's confident
//! detections replace their landmarks; every other landmark keeps the value
//! it last had, down to its exact text.

pub mod continuity;

pub use continuity::*;
