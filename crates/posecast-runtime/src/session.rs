//! Session controller - lifecycle of the single active pose loop
//!
//! State machine: `Idle → Running → Stopping → Idle`.
//!
//! Start and stop are serialized under one async mutex. Starting while a
//! session runs stops and joins it first, so one log file or destination
//! never has two writers. The worker shares nothing with the controller
//! except its cancellation flag.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use posecast_core::{
    CaptureBackend, ErrorCategory, PosecastError, PosecastResult, SeedPose, SourceId,
    DEFAULT_POSE_VERSION,
};
use posecast_time::frame_interval;

use crate::{CancelFlag, LoopPlan, PoseLoop, RuntimeConfig, SessionReport};

/// Poll interval for `wait()`
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
}

/// A validated start request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub source: SourceId,
    pub destination: SocketAddr,
    pub target_fps: f64,
}

impl SessionRequest {
    pub fn new(source: SourceId, destination: SocketAddr, target_fps: f64) -> PosecastResult<Self> {
        frame_interval(target_fps)?;
        Ok(SessionRequest {
            source,
            destination,
            target_fps,
        })
    }

    /// Parse the source and resolve the destination host
    pub async fn resolve(
        source: &str,
        host: &str,
        port: u16,
        target_fps: f64,
    ) -> PosecastResult<Self> {
        let source: SourceId = source.parse()?;
        if port == 0 {
            return Err(PosecastError::InvalidInput("destination port must not be 0".into()));
        }
        frame_interval(target_fps)?;

        let destination = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| PosecastError::InvalidInput(format!("cannot resolve {}: {}", host, e)))?
            .next()
            .ok_or_else(|| {
                PosecastError::InvalidInput(format!("no address for {}", host))
            })?;

        Self::new(source, destination, target_fps)
    }
}

/// Description of the running session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: u64,
    pub source: SourceId,
    pub destination: SocketAddr,
    pub target_fps: f64,
    pub log_path: PathBuf,
    pub started_at: SystemTime,
    /// Failure of the previous session that no caller had been told about
    pub prior_failure: Option<SessionFailure>,
}

/// A session failure as reported to the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub category: ErrorCategory,
    pub message: String,
}

impl From<&PosecastError> for SessionFailure {
    fn from(error: &PosecastError) -> Self {
        SessionFailure {
            category: error.category(),
            message: error.to_string(),
        }
    }
}

/// How the most recent session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(SessionReport),
    Failed(SessionFailure),
}

/// Snapshot for the control plane
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub active: Option<SessionInfo>,
    pub last_outcome: Option<SessionOutcome>,
}

struct ActiveSession {
    info: SessionInfo,
    cancel: CancelFlag,
    handle: JoinHandle<PosecastResult<SessionReport>>,
}

struct Slot {
    state: SessionState,
    active: Option<ActiveSession>,
    last_outcome: Option<SessionOutcome>,
    /// Failure of a session that ended on its own, not yet returned to a caller
    unreported: Option<PosecastError>,
    next_id: u64,
}

/// Owner of the single active session
pub struct SessionController {
    backend: Arc<dyn CaptureBackend>,
    config: RuntimeConfig,
    seed: SeedPose,
    slot: Mutex<Slot>,
}

impl SessionController {
    /// Create a controller; loads the seed pose named by the config
    pub fn new(backend: Arc<dyn CaptureBackend>, config: RuntimeConfig) -> PosecastResult<Self> {
        config.validate()?;
        let seed = match &config.seed_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading seed pose");
                SeedPose::from_file(path)?
            }
            None => {
                tracing::debug!(version = DEFAULT_POSE_VERSION, "using built-in seed pose");
                SeedPose::builtin()?
            }
        };
        Ok(Self::with_seed(backend, config, seed))
    }

    pub fn with_seed(backend: Arc<dyn CaptureBackend>, config: RuntimeConfig, seed: SeedPose) -> Self {
        SessionController {
            backend,
            config,
            seed,
            slot: Mutex::new(Slot {
                state: SessionState::Idle,
                active: None,
                last_outcome: None,
                unreported: None,
                next_id: 1,
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Start a session, replacing any running one
    pub async fn start(
        &self,
        source: &str,
        host: &str,
        port: u16,
        target_fps: f64,
    ) -> PosecastResult<SessionInfo> {
        let request = SessionRequest::resolve(source, host, port, target_fps).await?;
        self.start_request(request).await
    }

    pub async fn start_request(&self, request: SessionRequest) -> PosecastResult<SessionInfo> {
        frame_interval(request.target_fps)?;
        let mut slot = self.slot.lock().await;

        self.reap(&mut slot).await;
        let mut prior_failure = None;
        if slot.active.is_some() {
            match self.stop_locked(&mut slot).await {
                Ok(_) => {}
                Err(PosecastError::StopTimeout(waited)) => {
                    return Err(PosecastError::DuplicateSession { waited });
                }
                Err(e) => {
                    tracing::error!("previous session failed: {}", e);
                    prior_failure = Some(SessionFailure::from(&e));
                }
            }
        }
        // Handed to the caller through the new session's info
        if let Some(e) = slot.unreported.take() {
            prior_failure = Some(SessionFailure::from(&e));
        }

        let plan = LoopPlan {
            source: request.source.clone(),
            destination: request.destination,
            target_fps: request.target_fps,
            hints: self.config.capture_hints(),
            log_dir: self.config.log_dir.clone(),
            log_mode: self.config.log_mode,
            threshold: self.config.confidence_threshold,
        };
        let cancel = CancelFlag::new();

        let backend = Arc::clone(&self.backend);
        let seed = self.seed.clone();
        let open_cancel = cancel.clone();
        let pose_loop = tokio::task::spawn_blocking(move || {
            PoseLoop::open(&plan, backend.as_ref(), seed, open_cancel)
        })
        .await
        .map_err(|e| PosecastError::WorkerFailed(e.to_string()))??;

        let id = slot.next_id;
        slot.next_id += 1;

        let info = SessionInfo {
            id,
            source: request.source,
            destination: request.destination,
            target_fps: request.target_fps,
            log_path: pose_loop.log_path().to_path_buf(),
            started_at: SystemTime::now(),
            prior_failure,
        };

        let span = tracing::info_span!(
            "session",
            id,
            source = %info.source,
            destination = %info.destination
        );
        let handle = tokio::task::spawn_blocking(move || span.in_scope(|| pose_loop.run()));

        tracing::info!(
            id,
            source = %info.source,
            destination = %info.destination,
            fps = info.target_fps,
            "session started"
        );

        slot.active = Some(ActiveSession {
            info: info.clone(),
            cancel,
            handle,
        });
        slot.state = SessionState::Running;

        Ok(info)
    }

    /// Stop the running session; a no-op when idle
    ///
    /// Surfaces the failure of a session that ended on its own since the
    /// last call.
    pub async fn stop(&self) -> PosecastResult<Option<SessionReport>> {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;

        if slot.active.is_none() {
            return match slot.unreported.take() {
                Some(e) => Err(e),
                None => Ok(None),
            };
        }
        self.stop_locked(&mut slot).await
    }

    /// Current state; a worker that ended on its own is reported as idle
    pub async fn state(&self) -> SessionState {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;
        slot.state
    }

    pub async fn status(&self) -> SessionStatus {
        let mut slot = self.slot.lock().await;
        self.reap(&mut slot).await;
        SessionStatus {
            state: slot.state,
            active: slot.active.as_ref().map(|a| a.info.clone()),
            last_outcome: slot.last_outcome.clone(),
        }
    }

    /// Wait for the running session to end by itself, without cancelling it
    pub async fn wait(&self) -> PosecastResult<Option<SessionReport>> {
        loop {
            {
                let mut slot = self.slot.lock().await;
                self.reap(&mut slot).await;

                if slot.active.is_none() {
                    if let Some(e) = slot.unreported.take() {
                        return Err(e);
                    }
                    return Ok(match &slot.last_outcome {
                        Some(SessionOutcome::Completed(report)) => Some(report.clone()),
                        _ => None,
                    });
                }
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Cancel and join the active session
    async fn stop_locked(&self, slot: &mut Slot) -> PosecastResult<Option<SessionReport>> {
        let Some(active) = slot.active.as_mut() else {
            return Ok(None);
        };

        slot.state = SessionState::Stopping;
        active.cancel.cancel();
        tracing::info!(id = active.info.id, "stopping session");

        let timeout = self.config.stop_timeout;
        let result = match tokio::time::timeout(timeout, &mut active.handle).await {
            Err(_) => {
                tracing::error!(
                    id = active.info.id,
                    "session did not stop within {:?}",
                    timeout
                );
                return Err(PosecastError::StopTimeout(timeout));
            }
            Ok(joined) => flatten_join(joined),
        };

        slot.active = None;
        slot.state = SessionState::Idle;
        record_outcome(slot, &result);
        result.map(Some)
    }

    /// Collect a worker that finished without being stopped
    async fn reap(&self, slot: &mut Slot) {
        let finished = slot
            .active
            .as_ref()
            .map(|a| a.handle.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        let Some(active) = slot.active.take() else {
            return;
        };
        let id = active.info.id;
        let result = flatten_join(active.handle.await);
        slot.state = SessionState::Idle;
        record_outcome(slot, &result);

        match result {
            Ok(report) => {
                tracing::info!(id, reason = ?report.stop_reason, "session ended");
            }
            Err(e) => {
                tracing::error!(id, "session failed: {}", e);
                slot.unreported = Some(e);
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.slot.get_mut().active.as_ref() {
            active.cancel.cancel();
        }
    }
}

fn flatten_join(
    joined: Result<PosecastResult<SessionReport>, tokio::task::JoinError>,
) -> PosecastResult<SessionReport> {
    joined.map_err(|e| PosecastError::WorkerFailed(e.to_string()))?
}

fn record_outcome(slot: &mut Slot, result: &PosecastResult<SessionReport>) {
    slot.last_outcome = Some(match result {
        Ok(report) => SessionOutcome::Completed(report.clone()),
        Err(e) => SessionOutcome::Failed(SessionFailure::from(e)),
    });
}
