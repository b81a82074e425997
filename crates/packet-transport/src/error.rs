use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for packet transport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for packet transport operations
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to bind to the specified address
    #[error("Failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, io::Error),

    /// Failed to send a packet to the specified address
    #[error("Failed to send packet to {0}: {1}")]
    SendFailed(SocketAddr, io::Error),

    /// Failed to receive a packet
    #[error("Failed to receive packet: {0}")]
    ReceiveFailed(io::Error),

    /// Failed to get local address
    #[error("Failed to get local address: {0}")]
    LocalAddrFailed(io::Error),

    /// Transport is closed
    #[error("Transport closed")]
    TransportClosed,

    /// Inbound bytes could not be decoded into a packet
    #[error("Failed to decode packet: {0}")]
    DecodeFailed(String),

    /// Packet too large for the transport
    #[error("Packet too large for transport ({0} bytes)")]
    PacketTooLarge(usize),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Returns true if the error means the transport can no longer be used
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::TransportClosed | Error::ChannelClosed)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for Error {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_categorization() {
        assert!(Error::TransportClosed.is_closed());
        assert!(Error::ChannelClosed.is_closed());
        assert!(!Error::DecodeFailed("short".to_string()).is_closed());
        assert!(!Error::PacketTooLarge(70_000).is_closed());
    }
}
