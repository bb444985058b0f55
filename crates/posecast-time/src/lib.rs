//! Posecast Time - Frame pacing
//!
//! This crate provides:
//! - `FramePacer`: holds each loop iteration to at least `1/F` seconds
//! - Pacing statistics (iterations, overruns, time slept)

pub mod pacer;

pub use pacer::*;
