//! posecast - publish pose landmarks for one source
//!
//! Usage: `posecast <source> [config.json]`
//!
//! `<source>` is a camera index or a replay file. Runs until the source
//! ends or Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use posecast_runtime::{init_logging, ReplayBackend, RuntimeConfig, SessionController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let Some(source) = args.next() else {
        eprintln!("usage: posecast <source> [config.json]");
        std::process::exit(2);
    };
    let config_path = args.next().map(PathBuf::from);

    let config = RuntimeConfig::load(config_path.as_deref())?;
    init_logging(&config.logging)?;

    let host = config.destination_host.clone();
    let port = config.destination_port;
    let fps = config.target_fps;

    let controller = SessionController::new(Arc::new(ReplayBackend::new()), config)?;
    let info = controller.start(&source, &host, port, fps).await?;
    tracing::info!(log = %info.log_path.display(), "publishing");

    let report = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            controller.stop().await?
        }
        result = controller.wait() => result?,
    };

    if let Some(report) = report {
        tracing::info!(
            reason = ?report.stop_reason,
            frames = report.frames,
            sent = report.publish.datagrams_sent,
            dropped = report.publish.datagrams_dropped,
            elapsed = %humantime::format_duration(report.elapsed),
            "session complete"
        );
    }

    Ok(())
}
