//! Frame sources, pose estimators and the capture backend seam
//!
//! Decoding video and running the pose model are external concerns. The
//! publishing loop only sees these traits.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;

use crate::{Detection, PosecastError, PosecastResult};

/// Identifier of a video source: a camera index or a file path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceId {
    Camera(u32),
    File(PathBuf),
}

impl SourceId {
    /// Stem used to name the session log
    ///
    /// File sources use the file name up to its first `.`.
    pub fn log_stem(&self) -> String {
        match self {
            SourceId::Camera(index) => format!("camera-{}", index),
            SourceId::File(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let stem = name.split('.').next().unwrap_or_default();
                if stem.is_empty() {
                    "source".to_string()
                } else {
                    stem.to_string()
                }
            }
        }
    }

    /// Path of a file source
    pub fn path(&self) -> Option<&Path> {
        match self {
            SourceId::File(path) => Some(path),
            SourceId::Camera(_) => None,
        }
    }
}

impl FromStr for SourceId {
    type Err = PosecastError;

    fn from_str(s: &str) -> PosecastResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PosecastError::InvalidInput("empty source identifier".into()));
        }
        if s.bytes().all(|b| b.is_ascii_digit()) {
            let index = s
                .parse()
                .map_err(|_| PosecastError::InvalidInput(format!("camera index out of range: {s}")))?;
            return Ok(SourceId::Camera(index));
        }
        Ok(SourceId::File(PathBuf::from(s)))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Camera(index) => write!(f, "camera:{}", index),
            SourceId::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Requested capture properties, honored on a best-effort basis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureHints {
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureHints {
    fn default() -> Self {
        CaptureHints {
            width: 1280,
            height: 720,
        }
    }
}

/// One decoded RGB frame
#[derive(Debug, Clone)]
pub struct RgbFrame {
    /// Position in the source, starting at zero
    pub index: u64,
    pub width: u32,
    pub height: u32,
    /// Packed RGB8 pixels, row-major
    pub data: Bytes,
}

impl RgbFrame {
    pub fn new(index: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            index,
            width,
            height,
            data,
        }
    }

    /// A frame without pixel data
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        Self::new(index, width, height, Bytes::new())
    }
}

/// Ordered sequence of frames from a camera or file
pub trait FrameSource: Send {
    /// Height of the frames this source produces, in pixels
    fn frame_height(&self) -> u32;

    /// Next frame, or `None` at end of stream
    fn next_frame(&mut self) -> PosecastResult<Option<RgbFrame>>;
}

/// Black-box pose model
pub trait PoseEstimator: Send {
    /// Zero or more landmark detections for one frame
    fn estimate(&mut self, frame: &RgbFrame) -> PosecastResult<Vec<Detection>>;
}

/// A frame source paired with the estimator that will read it
pub struct Capture {
    pub source: Box<dyn FrameSource>,
    pub estimator: Box<dyn PoseEstimator>,
}

impl std::fmt::Debug for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capture")
            .field("frame_height", &self.source.frame_height())
            .finish_non_exhaustive()
    }
}

/// Resolves source identifiers into capture pipelines
pub trait CaptureBackend: Send + Sync {
    fn open(&self, source: &SourceId, hints: &CaptureHints) -> PosecastResult<Capture>;
}
