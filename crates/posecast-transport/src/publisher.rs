//! Publisher - logs and transmits each encoded frame
//!
//! Every frame is appended to the log first and then sent as one datagram,
//! using the same bytes for both. A log failure is fatal for the session.
//! A send failure is dropped: the frame stays in the log, the drop is
//! counted, and the loop carries on.

use std::net::SocketAddr;
use std::path::Path;

use bytes::Bytes;

use posecast_core::PosecastResult;

use crate::{DatagramSink, FrameLog};

/// Publish totals for a session
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub lines_logged: u64,
    pub datagrams_sent: u64,
    pub datagrams_dropped: u64,
    pub bytes_published: u64,
}

/// Log-then-send publisher owned by the session worker
pub struct Publisher {
    log: FrameLog,
    sink: DatagramSink,
    stats: PublishStats,
}

impl Publisher {
    pub fn new(log: FrameLog, sink: DatagramSink) -> Self {
        Publisher {
            log,
            sink,
            stats: PublishStats::default(),
        }
    }

    pub fn destination(&self) -> SocketAddr {
        self.sink.destination()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    /// Publish one encoded line
    pub fn publish(&mut self, line: &Bytes) -> PosecastResult<()> {
        self.log.append(line)?;
        self.stats.lines_logged += 1;
        self.stats.bytes_published += line.len() as u64;

        match self.sink.send(line) {
            Ok(_) => self.stats.datagrams_sent += 1,
            Err(e) => {
                self.stats.datagrams_dropped += 1;
                if self.stats.datagrams_dropped == 1 {
                    tracing::warn!(
                        destination = %self.sink.destination(),
                        "datagram dropped: {}", e
                    );
                } else {
                    tracing::debug!(
                        dropped = self.stats.datagrams_dropped,
                        "datagram dropped: {}", e
                    );
                }
            }
        }

        Ok(())
    }

    /// Close the log and the socket
    pub fn close(self) -> PosecastResult<PublishStats> {
        let Publisher { log, sink, stats } = self;
        drop(sink);
        log.close()?;
        Ok(stats)
    }
}
