//! Packet values and per-delivery routing metadata.
//!
//! A [`Packet`] is whatever value a protocol exchanges over a transport. The
//! transport itself only ever moves bytes, so every packet type knows how to
//! encode itself and how to be decoded from an inbound datagram.
//!
//! Routing metadata is never part of the packet itself. The dispatch loop
//! wraps every decoded packet in a [`ReceivedPacket`] carrying an optional,
//! typed [`PacketInfo`] describing where the datagram arrived and who sent it.

use std::fmt;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;

/// A value that can be exchanged over a [`Transport`](crate::Transport).
pub trait Packet: Clone + Send + Sync + fmt::Debug + 'static {
    /// Serializes the packet into the bytes handed to the transport
    fn encode(&self) -> Bytes;

    /// Parses an inbound datagram
    fn decode(data: &[u8]) -> Result<Self>;

    /// Encoded size in bytes
    fn size(&self) -> usize {
        self.encode().len()
    }
}

/// Opaque byte payload, the identity codec.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RawPacket(pub Bytes);

impl RawPacket {
    pub fn new(data: impl Into<Bytes>) -> Self {
        RawPacket(data.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&'static str> for RawPacket {
    fn from(s: &'static str) -> Self {
        RawPacket(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Vec<u8>> for RawPacket {
    fn from(v: Vec<u8>) -> Self {
        RawPacket(Bytes::from(v))
    }
}

impl Packet for RawPacket {
    fn encode(&self) -> Bytes {
        self.0.clone()
    }

    fn decode(data: &[u8]) -> Result<Self> {
        Ok(RawPacket(Bytes::copy_from_slice(data)))
    }

    fn size(&self) -> usize {
        self.0.len()
    }
}

/// Routing metadata attached by the transport to one delivered packet.
///
/// `local_addr` is the address of the socket that received the datagram and
/// may be unknown; `peer_addr` is the remote address it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketInfo {
    pub local_addr: Option<SocketAddr>,
    pub peer_addr: SocketAddr,
}

impl PacketInfo {
    pub fn new(local_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Self {
            local_addr: Some(local_addr),
            peer_addr,
        }
    }

    /// Metadata for a delivery whose receiving socket address is unknown
    pub fn from_peer(peer_addr: SocketAddr) -> Self {
        Self {
            local_addr: None,
            peer_addr,
        }
    }
}

impl fmt::Display for PacketInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.local_addr {
            Some(local) => write!(f, "{} <- {}", local, self.peer_addr),
            None => write!(f, "<unknown> <- {}", self.peer_addr),
        }
    }
}

/// One packet delivery: the decoded value plus its routing metadata.
#[derive(Debug, Clone)]
pub struct ReceivedPacket<P> {
    pub packet: P,
    pub info: Option<PacketInfo>,
}

impl<P: Packet> ReceivedPacket<P> {
    pub fn new(packet: P, info: PacketInfo) -> Self {
        Self {
            packet,
            info: Some(info),
        }
    }

    /// A delivery the transport failed to annotate
    pub fn without_info(packet: P) -> Self {
        Self { packet, info: None }
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.info.map(|info| info.peer_addr)
    }
}
