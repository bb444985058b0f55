//! Posecast Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every stage of the publishing loop:
//! - Landmarks, detections and the fixed-shape landmark vector
//! - The versioned seed pose asset
//! - Source identifiers, frames and the collaborator traits
//!   (frame source, pose estimator, capture backend)
//! - The error type and its control-plane categories

pub mod error;
pub mod landmark;
pub mod seed;
pub mod source;

pub use error::*;
pub use landmark::*;
pub use seed::*;
pub use source::*;
