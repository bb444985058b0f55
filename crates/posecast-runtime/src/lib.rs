//! Posecast Runtime - Pacing loop and session control
//!
//! One session at a time runs this loop on a dedicated worker:
//! 1. Check the cancellation flag
//! 2. Start the frame tick
//! 3. Read a frame (end of stream ends the session)
//! 4. Estimate landmarks
//! 5. Merge into the continuity buffer
//! 6. Encode the line
//! 7. Log and send it
//! 8. Sleep out the rest of the frame interval

pub mod config;
pub mod logging;
pub mod pipeline;
pub mod replay;
pub mod session;

pub use config::*;
pub use logging::*;
pub use pipeline::*;
pub use replay::*;
pub use session::*;
