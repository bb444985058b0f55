//! Pose loop - the paced detect, merge, encode, publish cycle

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use posecast_core::{
    Capture, CaptureBackend, CaptureHints, PosecastResult, SeedPose, SourceId,
};
use posecast_state::{ContinuityBuffer, ContinuityStats, MergeOutcome};
use posecast_time::{FramePacer, PacingStats};
use posecast_transport::{DatagramSink, FrameLog, LogMode, PublishStats, Publisher};
use posecast_wire::encode_line;

/// Cooperative cancellation flag shared between control plane and worker
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why a loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was observed at the top of an iteration
    Cancelled,
    /// The source ran out of frames
    EndOfStream,
    /// The source failed mid-stream (device disconnect, decode failure)
    SourceLost,
}

/// Summary of a finished session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub stop_reason: StopReason,
    /// Frames read and published
    pub frames: u64,
    pub estimator_failures: u64,
    pub elapsed: Duration,
    pub continuity: ContinuityStats,
    pub publish: PublishStats,
    pub pacing: PacingStats,
}

/// Everything needed to open one session
#[derive(Debug, Clone)]
pub struct LoopPlan {
    pub source: SourceId,
    pub destination: SocketAddr,
    pub target_fps: f64,
    pub hints: CaptureHints,
    pub log_dir: PathBuf,
    pub log_mode: LogMode,
    pub threshold: f32,
}

/// One session's loop, exclusively owned by its worker
pub struct PoseLoop {
    capture: Capture,
    frame_height: u32,
    buffer: ContinuityBuffer,
    publisher: Publisher,
    pacer: FramePacer,
    cancel: CancelFlag,
}

impl PoseLoop {
    /// Open the source, the log and the socket, in that order
    pub fn open(
        plan: &LoopPlan,
        backend: &dyn CaptureBackend,
        seed: SeedPose,
        cancel: CancelFlag,
    ) -> PosecastResult<Self> {
        let pacer = FramePacer::new(plan.target_fps)?;
        let capture = backend.open(&plan.source, &plan.hints)?;
        let log = FrameLog::open(&plan.log_dir, &plan.source.log_stem(), plan.log_mode)?;
        let sink = DatagramSink::bind(plan.destination)?;

        Ok(Self::new(
            capture,
            ContinuityBuffer::with_threshold(seed, plan.threshold),
            Publisher::new(log, sink),
            pacer,
            cancel,
        ))
    }

    /// Assemble a loop from already-opened parts
    pub fn new(
        capture: Capture,
        buffer: ContinuityBuffer,
        publisher: Publisher,
        pacer: FramePacer,
        cancel: CancelFlag,
    ) -> Self {
        let frame_height = capture.source.frame_height();
        PoseLoop {
            capture,
            frame_height,
            buffer,
            publisher,
            pacer,
            cancel,
        }
    }

    pub fn log_path(&self) -> &Path {
        self.publisher.log_path()
    }

    /// Run until cancelled or the source ends
    ///
    /// Returns an error only for a log write failure.
    pub fn run(mut self) -> PosecastResult<SessionReport> {
        let started = Instant::now();
        let mut frames = 0u64;
        let mut estimator_failures = 0u64;

        tracing::info!(
            destination = %self.publisher.destination(),
            log = %self.publisher.log_path().display(),
            frame_height = self.frame_height,
            threshold = self.buffer.threshold(),
            interval_ms = self.pacer.interval().as_secs_f64() * 1000.0,
            "pose loop started"
        );

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let tick = self.pacer.begin();

            let frame = match self.capture.source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::EndOfStream,
                Err(e) => {
                    tracing::warn!("source lost after {} frames: {}", frames, e);
                    break StopReason::SourceLost;
                }
            };

            let detections = match self.capture.estimator.estimate(&frame) {
                Ok(detections) => detections,
                Err(e) => {
                    estimator_failures += 1;
                    if estimator_failures == 1 {
                        tracing::warn!(frame = frame.index, "pose estimation failed: {}", e);
                    } else {
                        tracing::debug!(frame = frame.index, "pose estimation failed: {}", e);
                    }
                    Vec::new()
                }
            };

            let outcome = self.buffer.merge(&detections, self.frame_height);
            if let MergeOutcome::Updated { accepted, rejected } = outcome {
                tracing::debug!(frame = frame.index, accepted, rejected, "landmarks merged");
            }

            let line = encode_line(self.buffer.current());
            if let Err(e) = self.publisher.publish(&line) {
                tracing::error!(frame = frame.index, "stopping session: {}", e);
                return Err(e);
            }
            frames += 1;

            let cancel = &self.cancel;
            self.pacer.finish_unless(tick, || cancel.is_cancelled());
        };

        let PoseLoop {
            capture,
            buffer,
            publisher,
            pacer,
            ..
        } = self;
        drop(capture);
        let publish = publisher.close()?;

        let report = SessionReport {
            stop_reason,
            frames,
            estimator_failures,
            elapsed: started.elapsed(),
            continuity: buffer.stats().clone(),
            publish,
            pacing: pacer.stats().clone(),
        };

        tracing::info!(
            reason = ?report.stop_reason,
            frames = report.frames,
            dropped = report.publish.datagrams_dropped,
            overruns = report.pacing.overruns,
            "pose loop finished"
        );

        Ok(report)
    }
}
