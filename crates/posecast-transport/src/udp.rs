//! UDP datagram sink

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use posecast_core::{PosecastError, PosecastResult};

/// Fire-and-forget UDP sender bound to one destination
pub struct DatagramSink {
    socket: UdpSocket,
    local_addr: SocketAddr,
    destination: SocketAddr,
}

impl DatagramSink {
    /// Bind an ephemeral local socket of the destination's address family
    pub fn bind(destination: SocketAddr) -> PosecastResult<Self> {
        let local: SocketAddr = match destination {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket =
            UdpSocket::bind(local).map_err(|e| PosecastError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| PosecastError::TransportError(e.to_string()))?;

        Ok(DatagramSink {
            socket,
            local_addr,
            destination,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Send one datagram; no acknowledgment, no retry
    pub fn send(&self, payload: &[u8]) -> PosecastResult<usize> {
        self.socket
            .send_to(payload, self.destination)
            .map_err(|e| PosecastError::TransportError(e.to_string()))
    }
}
