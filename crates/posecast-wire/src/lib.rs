//! Posecast Wire Format - Landmark line encoding
//!
//! Every published frame is one ASCII line:
//! - 99 decimal values (33 landmarks × x, y, z)
//! - separated by `,`
//! - terminated by `\n`
//!
//! The same bytes are sent as the UDP payload and appended to the log.

pub mod line;

pub use line::*;

/// Default consumer host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default consumer UDP port
pub const DEFAULT_PORT: u16 = 5053;
