//! Append-only frame log

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use posecast_core::{PosecastError, PosecastResult};

/// Log file extension
pub const LOG_EXTENSION: &str = "txt";

/// How an existing log is treated when a session opens it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Keep earlier lines and append
    #[default]
    Append,
    /// Start the file over
    Truncate,
}

/// Path of the log for a source stem
pub fn log_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.{}", stem, LOG_EXTENSION))
}

/// Append-only log of published lines
pub struct FrameLog {
    writer: Box<dyn Write + Send>,
    path: PathBuf,
    lines: u64,
}

impl FrameLog {
    /// Open (creating if needed) the log for a source stem inside `dir`
    pub fn open(dir: &Path, stem: &str, mode: LogMode) -> PosecastResult<Self> {
        std::fs::create_dir_all(dir)?;
        Self::open_path(&log_path(dir, stem), mode)
    }

    /// Open a log at an explicit path
    pub fn open_path(path: &Path, mode: LogMode) -> PosecastResult<Self> {
        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            LogMode::Append => options.append(true),
            LogMode::Truncate => options.write(true).truncate(true),
        };

        let file = options.open(path)?;
        tracing::debug!(path = %path.display(), ?mode, "frame log opened");

        Ok(Self::from_writer(path.to_path_buf(), Box::new(file)))
    }

    /// Wrap an arbitrary writer; `path` only labels errors
    pub fn from_writer(path: PathBuf, writer: Box<dyn Write + Send>) -> Self {
        FrameLog {
            writer,
            path,
            lines: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended by this handle
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// Append one encoded line
    pub fn append(&mut self, line: &[u8]) -> PosecastResult<()> {
        self.writer
            .write_all(line)
            .map_err(|error| PosecastError::LogWrite {
                path: self.path.clone(),
                error,
            })?;
        self.lines += 1;
        Ok(())
    }

    /// Flush and close the log
    pub fn close(mut self) -> PosecastResult<u64> {
        self.writer.flush().map_err(|error| PosecastError::LogWrite {
            path: self.path.clone(),
            error,
        })?;
        tracing::debug!(path = %self.path.display(), lines = self.lines, "frame log closed");
        Ok(self.lines)
    }
}
