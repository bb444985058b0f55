//! Posecast Transport Layer - datagram publishing and frame logging
//!
//! This crate provides:
//! - UDP datagram sink (fire and forget)
//! - Append-only frame log, one file per source
//! - `Publisher`: log then send, once per frame

pub mod log;
pub mod publisher;
pub mod udp;

pub use log::*;
pub use publisher::*;
pub use udp::*;
