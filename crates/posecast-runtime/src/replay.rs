//! Replay backend - recorded detections stand in for camera and model
//!
//! A replay file is JSON:
//!
//! ```json
//! { "frame_height": 720,
//!   "frames": [ [ { "index": 0, "x": 0.5, "y": 0.5, "z": -0.1, "visibility": 0.9 } ], [] ] }
//! ```
//!
//! Each entry of `frames` is what the estimator reports for that frame.
//! Cameras are not available through this backend.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use posecast_core::{
    Capture, CaptureBackend, CaptureHints, Detection, FrameSource, PoseEstimator, PosecastError,
    PosecastResult, RgbFrame, SourceId,
};

fn default_frame_width() -> u32 {
    CaptureHints::default().width
}

/// Recorded per-frame detections
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReplayScript {
    pub frame_height: u32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    pub frames: Vec<Vec<Detection>>,
}

impl ReplayScript {
    pub fn from_json(text: &str) -> PosecastResult<Self> {
        let script: ReplayScript = serde_json::from_str(text)
            .map_err(|e| PosecastError::InvalidInput(format!("replay script: {}", e)))?;
        if script.frame_height == 0 {
            return Err(PosecastError::InvalidInput(
                "replay script: frame_height must be non-zero".into(),
            ));
        }
        Ok(script)
    }

    pub fn from_file(path: &Path) -> PosecastResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Opens file sources as replay scripts
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayBackend;

impl ReplayBackend {
    pub fn new() -> Self {
        ReplayBackend
    }

    /// Capture over an in-memory script
    pub fn capture(script: ReplayScript) -> Capture {
        let script = Arc::new(script);
        Capture {
            source: Box::new(ReplaySource {
                script: Arc::clone(&script),
                next: 0,
            }),
            estimator: Box::new(ReplayEstimator { script }),
        }
    }
}

impl CaptureBackend for ReplayBackend {
    fn open(&self, source: &SourceId, _hints: &CaptureHints) -> PosecastResult<Capture> {
        let Some(path) = source.path() else {
            return Err(PosecastError::SourceOpen {
                id: source.to_string(),
                reason: "cameras are not supported by the replay backend".into(),
            });
        };

        let script = ReplayScript::from_file(path).map_err(|e| PosecastError::SourceOpen {
            id: source.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(source = %source, frames = script.len(), "replay script loaded");

        Ok(Self::capture(script))
    }
}

/// Blank frames, one per script entry
pub struct ReplaySource {
    script: Arc<ReplayScript>,
    next: u64,
}

impl FrameSource for ReplaySource {
    fn frame_height(&self) -> u32 {
        self.script.frame_height
    }

    fn next_frame(&mut self) -> PosecastResult<Option<RgbFrame>> {
        if self.next as usize >= self.script.frames.len() {
            return Ok(None);
        }
        let frame = RgbFrame::blank(self.next, self.script.frame_width, self.script.frame_height);
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Reports the recorded detections for each frame index
pub struct ReplayEstimator {
    script: Arc<ReplayScript>,
}

impl PoseEstimator for ReplayEstimator {
    fn estimate(&mut self, frame: &RgbFrame) -> PosecastResult<Vec<Detection>> {
        usize::try_from(frame.index)
            .ok()
            .and_then(|i| self.script.frames.get(i))
            .cloned()
            .ok_or_else(|| PosecastError::Estimator(format!("no recording for frame {}", frame.index)))
    }
}
