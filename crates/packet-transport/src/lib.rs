//! Connectionless packet transport layer for the pktx stack
//!
//! This crate provides the transport collaborator the transaction engine is
//! built on: a [`Transport`] trait with UDP and in-memory implementations,
//! the [`Packet`] value abstraction with its per-delivery routing metadata,
//! and [`PacketSocket`], which multiplexes one transport across many
//! priority-ordered [`PacketListener`]s.

pub mod error;
pub mod packet;
pub mod socket;
pub mod transport;

// Re-export commonly used types and functions
pub use error::{Error, Result};
pub use packet::{Packet, PacketInfo, RawPacket, ReceivedPacket};
pub use socket::{DispatchOutcome, ListenerId, PacketListener, PacketSocket};
pub use transport::memory::{MemoryTransport, SendMode, SentDatagram};
#[cfg(feature = "udp")]
pub use transport::udp::UdpTransport;
pub use transport::{Transport, TransportEvent};

/// Bind a UDP transport to the specified address
#[cfg(feature = "udp")]
pub async fn bind_udp(
    addr: std::net::SocketAddr,
) -> Result<(UdpTransport, tokio::sync::mpsc::Receiver<TransportEvent>)> {
    UdpTransport::bind(addr, None).await
}

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        DispatchOutcome, Error, ListenerId, MemoryTransport, Packet, PacketInfo, PacketListener, SendMode,
        PacketSocket, RawPacket, ReceivedPacket, Result, Transport, TransportEvent,
    };
    #[cfg(feature = "udp")]
    pub use crate::{UdpTransport, bind_udp};
}
