use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::{Error, Result};

// Buffer size for receiving datagrams; larger datagrams are truncated by the OS
const UDP_BUFFER_SIZE: usize = 65_535;

/// UDP listener for receiving datagrams
pub struct UdpListener {
    socket: Arc<UdpSocket>,
}

impl UdpListener {
    /// Binds the UDP listener to the specified address
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::BindFailed(addr, e))?;

        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Returns a cloned Arc to the underlying socket
    pub fn clone_socket(&self) -> Arc<UdpSocket> {
        self.socket.clone()
    }

    /// Returns the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::LocalAddrFailed)
    }

    /// Receives one datagram, returning it with its source and the local address
    pub async fn receive(&self) -> Result<(Bytes, SocketAddr, SocketAddr)> {
        let mut buffer = BytesMut::zeroed(UDP_BUFFER_SIZE);

        let (len, src) = self
            .socket
            .recv_from(&mut buffer)
            .await
            .map_err(Error::ReceiveFailed)?;

        let local_addr = self.local_addr()?;

        buffer.truncate(len);
        trace!("Received {} bytes from {}", len, src);

        Ok((buffer.freeze(), src, local_addr))
    }
}
