//! End-to-end session tests
//!
//! Each test drives a real `SessionController` against a scripted backend,
//! a temporary log directory and a loopback UDP receiver.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use posecast_core::{Detection, ErrorCategory, PosecastError, SeedPose, SourceId};
use posecast_runtime::{
    RuntimeConfig, SessionController, SessionOutcome, SessionState, StopReason,
};
use posecast_wire::encode_line;

use crate::harness::{read_log_lines, CaptureScript, Gate, ScriptedBackend, UdpCapture};

const HOST: &str = "127.0.0.1";
const FPS: f64 = 200.0;

fn config(dir: &Path) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.log_dir = dir.to_path_buf();
    config.target_fps = FPS;
    config.stop_timeout = Duration::from_secs(1);
    config
}

fn controller(script: CaptureScript, config: RuntimeConfig) -> (SessionController, Arc<ScriptedBackend>) {
    let backend = Arc::new(ScriptedBackend::new(script));
    let controller = SessionController::new(backend.clone(), config).unwrap();
    (controller, backend)
}

fn seed_line() -> String {
    let line = encode_line(SeedPose::builtin().unwrap().vector());
    String::from_utf8(line.to_vec()).unwrap().trim_end().to_string()
}

fn log_file(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.txt", stem))
}

#[tokio::test]
async fn test_no_detections_publishes_seed_pose() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let (controller, _) = controller(
        CaptureScript::Frames(vec![Vec::new(); 5]),
        config(dir.path()),
    );

    controller.start("clip.mp4", HOST, port, FPS).await.unwrap();
    let report = controller.wait().await.unwrap().unwrap();

    assert_eq!(report.stop_reason, StopReason::EndOfStream);
    assert_eq!(report.frames, 5);
    assert_eq!(report.continuity.retained_frames, 5);

    let seed = seed_line();
    let lines = read_log_lines(&log_file(dir.path(), "clip"));
    assert_eq!(lines.len(), 5);
    assert!(lines.iter().all(|l| *l == seed));

    let datagrams = rx.drain();
    assert_eq!(datagrams.len(), 5);
    for datagram in datagrams {
        assert_eq!(datagram, format!("{}\n", seed).into_bytes());
    }
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_detections_persist_across_frames() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let frames = vec![
        vec![Detection::new(0, 0.25, 0.5, -0.1, 0.9)],
        Vec::new(),
        // Below threshold
        vec![Detection::new(0, 0.9, 0.9, 0.9, 0.3)],
        // Out of range
        vec![Detection::new(99, 0.9, 0.9, 0.9, 0.9)],
    ];
    let (controller, _) = controller(CaptureScript::Frames(frames), config(dir.path()));

    controller.start("dance.webm", HOST, port, FPS).await.unwrap();
    let report = controller.wait().await.unwrap().unwrap();
    assert_eq!(report.frames, 4);
    assert_eq!(report.continuity.accepted, 1);
    assert_eq!(report.continuity.rejected, 2);

    let lines = read_log_lines(&log_file(dir.path(), "dance"));
    assert_eq!(lines.len(), 4);

    let first: Vec<&str> = lines[0].split(',').collect();
    assert_eq!(&first[..3], &["250.00", "360.00", "-100.00"]);
    let seed = seed_line();
    let seed_fields: Vec<&str> = seed.split(',').collect();
    assert_eq!(&first[3..], &seed_fields[3..]);

    assert!(lines.iter().all(|l| *l == lines[0]));

    for (datagram, line) in rx.drain().iter().zip(&lines) {
        assert_eq!(datagram, &format!("{}\n", line).into_bytes());
    }
}

#[tokio::test]
async fn test_restart_closes_previous_session() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let (controller, backend) = controller(CaptureScript::Endless, config(dir.path()));

    let first = controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = controller.start("b.mp4", HOST, port, FPS).await.unwrap();
    assert_ne!(first.id, second.id);

    let a_log = log_file(dir.path(), "a");
    let a_lines = read_log_lines(&a_log).len();
    assert!(a_lines > 0);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(read_log_lines(&a_log).len(), a_lines);

    let status = controller.status().await;
    assert_eq!(status.state, SessionState::Running);
    assert_eq!(
        status.active.map(|info| info.source),
        Some(SourceId::File(PathBuf::from("b.mp4")))
    );
    match status.last_outcome {
        Some(SessionOutcome::Completed(report)) => {
            assert_eq!(report.stop_reason, StopReason::Cancelled)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let report = controller.stop().await.unwrap().unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert!(!read_log_lines(&log_file(dir.path(), "b")).is_empty());
    assert_eq!(
        backend.opened(),
        vec![
            SourceId::File(PathBuf::from("a.mp4")),
            SourceId::File(PathBuf::from("b.mp4")),
        ]
    );
}

#[tokio::test]
async fn test_camera_session_log_name() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let (controller, backend) = controller(CaptureScript::Endless, config(dir.path()));

    let info = controller.start("0", HOST, port, FPS).await.unwrap();
    assert_eq!(info.log_path, log_file(dir.path(), "camera-0"));
    assert_eq!(backend.opened(), vec![SourceId::Camera(0)]);

    controller.stop().await.unwrap();
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_stop_when_idle_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, _) = controller(CaptureScript::Endless, config(dir.path()));

    assert!(controller.stop().await.unwrap().is_none());
    assert!(controller.stop().await.unwrap().is_none());
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_stuck_session_blocks_restart() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let gate = Gate::new();

    let mut config = config(dir.path());
    config.stop_timeout = Duration::from_millis(100);
    let (controller, backend) = controller(CaptureScript::Gated(gate.clone()), config);

    controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    let entered = {
        let gate = gate.clone();
        tokio::task::spawn_blocking(move || gate.wait_entered(Duration::from_secs(5)))
            .await
            .unwrap()
    };
    assert!(entered);

    let err = controller.stop().await.unwrap_err();
    assert!(matches!(err, PosecastError::StopTimeout(_)));
    assert_eq!(err.category(), ErrorCategory::Timeout);
    assert_eq!(controller.state().await, SessionState::Stopping);

    let err = controller.start("b.mp4", HOST, port, FPS).await.unwrap_err();
    assert!(matches!(err, PosecastError::DuplicateSession { .. }));
    assert_eq!(err.category(), ErrorCategory::DuplicateSession);
    assert_eq!(backend.opened().len(), 1);

    gate.release();
    let report = controller.wait().await.unwrap().unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_invalid_rate_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, backend) = controller(CaptureScript::Endless, config(dir.path()));

    for fps in [0.0, -15.0, f64::NAN, f64::INFINITY] {
        let err = controller.start("a.mp4", HOST, 5053, fps).await.unwrap_err();
        assert_eq!(err.category(), ErrorCategory::InvalidInput);
    }

    assert!(backend.opened().is_empty());
    assert_eq!(controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn test_open_failure_leaves_controller_idle() {
    let dir = tempfile::tempdir().unwrap();
    let (controller, backend) = controller(CaptureScript::Unavailable, config(dir.path()));

    let err = controller.start("a.mp4", HOST, 5053, FPS).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::SourceUnavailable);
    assert_eq!(backend.opened().len(), 1);

    let status = controller.status().await;
    assert_eq!(status.state, SessionState::Idle);
    assert!(status.active.is_none());
    assert!(!log_file(dir.path(), "a").exists());
    assert!(controller.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_dropping_controller_cancels_session() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    let (controller, _) = controller(CaptureScript::Endless, config(dir.path()));

    controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    drop(controller);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let a_log = log_file(dir.path(), "a");
    let lines = read_log_lines(&a_log).len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(read_log_lines(&a_log).len(), lines);
}

#[tokio::test]
async fn test_low_rate_session_stops_promptly() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    // Default 2 s stop timeout, 2.5 s frame interval
    let mut config = config(dir.path());
    config.stop_timeout = RuntimeConfig::default().stop_timeout;
    let (controller, _) = controller(CaptureScript::Endless, config);

    controller.start("a.mp4", HOST, port, 0.4).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = controller.stop().await.unwrap().unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
    assert_eq!(report.frames, 1);
    assert_eq!(controller.state().await, SessionState::Idle);

    // A restart is not mistaken for a stuck session
    controller.start("b.mp4", HOST, port, 0.4).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.start("c.mp4", HOST, port, 0.4).await.unwrap();
    controller.stop().await.unwrap();
}

/// Route the log for `stem` to a device that rejects every write
#[cfg(target_os = "linux")]
fn full_disk_log(dir: &Path, stem: &str) {
    std::os::unix::fs::symlink("/dev/full", log_file(dir, stem)).unwrap();
}

#[cfg(target_os = "linux")]
async fn wait_until_idle(controller: &SessionController) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while controller.state().await != SessionState::Idle {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_log_failure_reaches_control_plane() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    full_disk_log(dir.path(), "a");
    let (controller, _) = controller(CaptureScript::Endless, config(dir.path()));

    controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    wait_until_idle(&controller).await;

    match controller.status().await.last_outcome {
        Some(SessionOutcome::Failed(failure)) => {
            assert_eq!(failure.category, ErrorCategory::Io)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    // Reported once, then stop is a no-op again
    let err = controller.stop().await.unwrap_err();
    assert!(matches!(err, PosecastError::LogWrite { .. }));
    assert!(controller.stop().await.unwrap().is_none());
    assert!(rx.drain().is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_log_failure_reaches_wait() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    full_disk_log(dir.path(), "a");
    let (controller, _) = controller(CaptureScript::Endless, config(dir.path()));

    controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    let err = controller.wait().await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
    assert!(controller.wait().await.unwrap().is_none());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_unreported_failure_is_handed_to_next_start() {
    let dir = tempfile::tempdir().unwrap();
    let rx = UdpCapture::bind().unwrap();
    let port = rx.addr().unwrap().port();
    full_disk_log(dir.path(), "a");
    let (controller, _) = controller(CaptureScript::Endless, config(dir.path()));

    let first = controller.start("a.mp4", HOST, port, FPS).await.unwrap();
    assert!(first.prior_failure.is_none());
    wait_until_idle(&controller).await;

    let second = controller.start("b.mp4", HOST, port, FPS).await.unwrap();
    let failure = second.prior_failure.clone().unwrap();
    assert_eq!(failure.category, ErrorCategory::Io);
    assert!(failure.message.contains("a.txt"));

    let status = controller.status().await;
    assert_eq!(status.active.and_then(|info| info.prior_failure), Some(failure));

    // Already handed over, so stopping the healthy session succeeds
    let report = controller.stop().await.unwrap().unwrap();
    assert_eq!(report.stop_reason, StopReason::Cancelled);
}
