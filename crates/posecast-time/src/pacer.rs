//! Frame pacer - enforces a minimum wall-clock interval per iteration

use std::time::{Duration, Instant};

use posecast_core::{PosecastError, PosecastResult};

/// Longest single sleep while waiting on a cancellable iteration
pub const CANCEL_POLL_SLICE: Duration = Duration::from_millis(10);

/// Pacing statistics for one run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PacingStats {
    /// Completed iterations
    pub iterations: u64,
    /// Iterations whose processing exceeded the interval
    pub overruns: u64,
    /// Total time spent waiting
    pub slept: Duration,
    /// Processing cost of the most recent iteration
    pub last_cost: Duration,
}

/// Start of one paced iteration
#[derive(Clone, Copy, Debug)]
pub struct FrameTick {
    started: Instant,
}

impl FrameTick {
    pub fn started(&self) -> Instant {
        self.started
    }
}

/// Frame pacer
///
/// INVARIANT: an iteration that finishes early is stretched to `interval`.
/// An iteration that finishes late proceeds immediately; there is no catch-up
/// and no frame skipping.
pub struct FramePacer {
    interval: Duration,
    stats: PacingStats,
}

impl FramePacer {
    /// Create a pacer for a target rate in frames per second
    pub fn new(target_fps: f64) -> PosecastResult<Self> {
        Ok(FramePacer {
            interval: frame_interval(target_fps)?,
            stats: PacingStats::default(),
        })
    }

    /// Target interval per iteration
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Mark the start of an iteration
    pub fn begin(&self) -> FrameTick {
        FrameTick {
            started: Instant::now(),
        }
    }

    /// Finish an iteration, blocking for the rest of the interval
    /// Returns the time slept
    pub fn finish(&mut self, tick: FrameTick) -> Duration {
        let elapsed = tick.started.elapsed();
        let wait = remaining(self.interval, elapsed);

        self.stats.iterations += 1;
        self.stats.last_cost = elapsed;

        if wait.is_zero() {
            self.stats.overruns += 1;
            tracing::trace!(
                cost_us = elapsed.as_micros() as u64,
                interval_us = self.interval.as_micros() as u64,
                "frame over budget"
            );
        } else {
            std::thread::sleep(wait);
            self.stats.slept += wait;
        }

        wait
    }

    /// Like `finish`, but the wait ends early once `cancelled` returns true
    ///
    /// The wait is cut into slices of at most `CANCEL_POLL_SLICE`, so a
    /// cancellation is seen within one slice at any frame rate.
    /// Returns the time slept.
    pub fn finish_unless<F>(&mut self, tick: FrameTick, cancelled: F) -> Duration
    where
        F: Fn() -> bool,
    {
        let elapsed = tick.started.elapsed();
        let wait = remaining(self.interval, elapsed);

        self.stats.iterations += 1;
        self.stats.last_cost = elapsed;

        if wait.is_zero() {
            self.stats.overruns += 1;
            tracing::trace!(
                cost_us = elapsed.as_micros() as u64,
                interval_us = self.interval.as_micros() as u64,
                "frame over budget"
            );
            return Duration::ZERO;
        }

        let deadline = tick.started + self.interval;
        let sleep_started = Instant::now();
        while !cancelled() {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                break;
            }
            std::thread::sleep(left.min(CANCEL_POLL_SLICE));
        }

        let slept = sleep_started.elapsed().min(wait);
        self.stats.slept += slept;
        slept
    }

    pub fn stats(&self) -> &PacingStats {
        &self.stats
    }
}

/// Interval for a target rate
pub fn frame_interval(target_fps: f64) -> PosecastResult<Duration> {
    if !target_fps.is_finite() || target_fps <= 0.0 {
        return Err(PosecastError::InvalidInput(format!(
            "target fps must be a positive number, got {}",
            target_fps
        )));
    }
    Duration::try_from_secs_f64(1.0 / target_fps).map_err(|_| {
        PosecastError::InvalidInput(format!("target fps out of range: {}", target_fps))
    })
}

/// Time left in the interval after `elapsed` of processing
pub fn remaining(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
