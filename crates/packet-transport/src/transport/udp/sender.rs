use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::{Error, Result};

// Largest payload a single IPv4 UDP datagram can carry
const MAX_UDP_PACKET_SIZE: usize = 65_507;

/// UDP sender sharing the listener's socket
#[derive(Clone)]
pub struct UdpSender {
    socket: Arc<UdpSocket>,
}

impl UdpSender {
    pub fn new(socket: Arc<UdpSocket>) -> Result<Self> {
        Ok(Self { socket })
    }

    /// Sends one datagram, returning the number of bytes written
    pub async fn send(&self, data: &[u8], destination: SocketAddr) -> Result<usize> {
        if data.len() > MAX_UDP_PACKET_SIZE {
            return Err(Error::PacketTooLarge(data.len()));
        }

        let sent = self
            .socket
            .send_to(data, destination)
            .await
            .map_err(|e| Error::SendFailed(destination, e))?;

        trace!("Sent {} of {} bytes to {}", sent, data.len(), destination);
        Ok(sent)
    }
}
