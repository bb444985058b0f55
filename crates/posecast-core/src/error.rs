//! Error types for Posecast

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Core Posecast errors
#[derive(Error, Debug)]
pub enum PosecastError {
    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid seed pose: {0}")]
    InvalidSeed(String),

    #[error("Invalid line format: {0}")]
    InvalidLine(String),

    #[error("Wrong scalar count: expected {expected}, got {actual}")]
    ScalarCount { expected: usize, actual: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    // Capture errors
    #[error("Cannot open source {id}: {reason}")]
    SourceOpen { id: String, reason: String },

    #[error("Source read failed: {0}")]
    SourceRead(String),

    #[error("Pose estimation failed: {0}")]
    Estimator(String),

    // Publish errors
    #[error("Log write failed for {}: {error}", .path.display())]
    LogWrite {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Transport error: {0}")]
    TransportError(String),

    // Session errors
    #[error("Previous session still running after {waited:?}")]
    DuplicateSession { waited: Duration },

    #[error("Session did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("Session worker failed: {0}")]
    WorkerFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure categories reported at the control-plane boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InvalidInput,
    Io,
    SourceUnavailable,
    DuplicateSession,
    Timeout,
    Internal,
}

impl PosecastError {
    /// Category of this error for control-plane reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            PosecastError::InvalidInput(_)
            | PosecastError::InvalidSeed(_)
            | PosecastError::InvalidLine(_)
            | PosecastError::ScalarCount { .. }
            | PosecastError::Config(_) => ErrorCategory::InvalidInput,
            PosecastError::SourceOpen { .. } | PosecastError::SourceRead(_) => {
                ErrorCategory::SourceUnavailable
            }
            PosecastError::LogWrite { .. }
            | PosecastError::TransportError(_)
            | PosecastError::Io(_) => ErrorCategory::Io,
            PosecastError::DuplicateSession { .. } => ErrorCategory::DuplicateSession,
            PosecastError::StopTimeout(_) => ErrorCategory::Timeout,
            PosecastError::Estimator(_) | PosecastError::WorkerFailed(_) => {
                ErrorCategory::Internal
            }
        }
    }
}

/// Result type for Posecast operations
pub type PosecastResult<T> = Result<T, PosecastError>;
