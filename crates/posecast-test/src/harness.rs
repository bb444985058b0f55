//! Scripted collaborators for session tests
//!
//! `ScriptedBackend` hands out captures following a fixed script and
//! records every source it was asked to open. `Gate` parks the estimator
//! until released, which models a worker that ignores cancellation.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use posecast_core::{
    Capture, CaptureBackend, CaptureHints, Detection, FrameSource, PoseEstimator, PosecastError,
    PosecastResult, RgbFrame, SourceId,
};
use posecast_runtime::{ReplayBackend, ReplayScript};

/// Frame height every scripted source reports
pub const SCRIPTED_FRAME_HEIGHT: u32 = 720;

#[derive(Default)]
struct GateState {
    entered: bool,
    released: bool,
}

#[derive(Default)]
struct GateInner {
    state: Mutex<GateState>,
    cond: Condvar,
}

/// One-shot barrier between a test and a worker thread
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<GateInner>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let every parked and future caller through
    pub fn release(&self) {
        let mut state = self.inner.state.lock();
        state.released = true;
        self.inner.cond.notify_all();
    }

    /// Block until a worker reached the gate; false on timeout
    pub fn wait_entered(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !state.entered {
            if self.inner.cond.wait_until(&mut state, deadline).timed_out() {
                return state.entered;
            }
        }
        true
    }

    fn pass(&self) {
        let mut state = self.inner.state.lock();
        state.entered = true;
        self.inner.cond.notify_all();
        while !state.released {
            self.inner.cond.wait(&mut state);
        }
    }
}

/// What every capture opened by a `ScriptedBackend` does
#[derive(Clone)]
pub enum CaptureScript {
    /// One frame per entry, then end of stream
    Frames(Vec<Vec<Detection>>),
    /// Frames forever, nothing detected
    Endless,
    /// Frames forever; the first estimate parks on the gate
    Gated(Gate),
    /// Opening fails
    Unavailable,
}

/// Backend following a fixed script
pub struct ScriptedBackend {
    script: CaptureScript,
    opened: Mutex<Vec<SourceId>>,
}

impl ScriptedBackend {
    pub fn new(script: CaptureScript) -> Self {
        ScriptedBackend {
            script,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Sources opened so far, in order, including failed attempts
    pub fn opened(&self) -> Vec<SourceId> {
        self.opened.lock().clone()
    }
}

impl CaptureBackend for ScriptedBackend {
    fn open(&self, source: &SourceId, _hints: &CaptureHints) -> PosecastResult<Capture> {
        self.opened.lock().push(source.clone());

        match &self.script {
            CaptureScript::Frames(frames) => Ok(ReplayBackend::capture(ReplayScript {
                frame_height: SCRIPTED_FRAME_HEIGHT,
                frame_width: CaptureHints::default().width,
                frames: frames.clone(),
            })),
            CaptureScript::Endless => Ok(Capture {
                source: Box::new(EndlessSource::default()),
                estimator: Box::new(NothingDetected),
            }),
            CaptureScript::Gated(gate) => Ok(Capture {
                source: Box::new(EndlessSource::default()),
                estimator: Box::new(GatedEstimator { gate: gate.clone() }),
            }),
            CaptureScript::Unavailable => Err(PosecastError::SourceOpen {
                id: source.to_string(),
                reason: "device busy".into(),
            }),
        }
    }
}

/// Source that never ends
#[derive(Default)]
pub struct EndlessSource {
    next: u64,
}

impl FrameSource for EndlessSource {
    fn frame_height(&self) -> u32 {
        SCRIPTED_FRAME_HEIGHT
    }

    fn next_frame(&mut self) -> PosecastResult<Option<RgbFrame>> {
        let frame = RgbFrame::blank(self.next, CaptureHints::default().width, SCRIPTED_FRAME_HEIGHT);
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Estimator that never sees anyone
pub struct NothingDetected;

impl PoseEstimator for NothingDetected {
    fn estimate(&mut self, _frame: &RgbFrame) -> PosecastResult<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Estimator that parks on a gate
pub struct GatedEstimator {
    gate: Gate,
}

impl PoseEstimator for GatedEstimator {
    fn estimate(&mut self, _frame: &RgbFrame) -> PosecastResult<Vec<Detection>> {
        self.gate.pass();
        Ok(Vec::new())
    }
}

/// Consumer stand-in bound to an ephemeral loopback port
pub struct UdpCapture {
    socket: UdpSocket,
}

impl UdpCapture {
    pub fn bind() -> io::Result<Self> {
        let socket = UdpSocket::bind("127.0.0.1:0")?;
        socket.set_read_timeout(Some(Duration::from_millis(500)))?;
        Ok(UdpCapture { socket })
    }

    pub fn addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Next datagram, waiting up to the read timeout
    pub fn recv(&self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; 2048];
        let (len, _) = self.socket.recv_from(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }

    /// Every datagram that arrives before the socket goes quiet
    pub fn drain(&self) -> Vec<Vec<u8>> {
        let mut datagrams = Vec::new();
        while let Ok(datagram) = self.recv() {
            datagrams.push(datagram);
        }
        datagrams
    }
}

/// Lines of a log file; empty when it does not exist
pub fn read_log_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|text| text.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
