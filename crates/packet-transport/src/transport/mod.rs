use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;

pub mod memory;
#[cfg(feature = "udp")]
pub mod udp;

pub use memory::MemoryTransport;
#[cfg(feature = "udp")]
pub use udp::UdpTransport;

/// Events emitted by a transport
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A datagram was received
    PacketReceived {
        /// The raw datagram
        data: Bytes,
        /// The remote address that sent the datagram
        source: SocketAddr,
        /// The local address that received the datagram
        destination: SocketAddr,
    },

    /// Error occurred in the transport
    Error {
        /// Error description
        error: String,
    },

    /// Transport has been closed
    Closed,
}

/// A connectionless, packet-oriented transport.
///
/// Implementations make no delivery or ordering promises; reliability is the
/// business of the layers above.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Returns the local address this transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Sends one datagram, returning the number of bytes written
    async fn transmit(&self, payload: Bytes, destination: SocketAddr) -> Result<usize>;

    /// Closes the transport
    async fn close(&self) -> Result<()>;

    /// Checks if the transport is closed
    fn is_closed(&self) -> bool;
}
