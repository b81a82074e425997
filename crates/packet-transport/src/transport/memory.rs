//! In-process transport.
//!
//! `MemoryTransport` records every datagram it is asked to send and can be
//! switched into failure modes, which makes retransmission behaviour
//! observable without touching the network. Two transports created with
//! [`MemoryTransport::pair`] deliver to each other's event channel.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// How `transmit` should behave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Report every byte as written
    #[default]
    Normal,
    /// Report zero bytes written
    ZeroBytes,
    /// Fail with [`Error::SendFailed`]
    Error,
    /// Park every send until [`MemoryTransport::release`] lets one through,
    /// then behave as `Normal`
    Gated,
}

/// A datagram recorded by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub payload: Bytes,
    pub destination: SocketAddr,
}

pub struct MemoryTransport {
    local_addr: SocketAddr,
    sent: Mutex<Vec<SentDatagram>>,
    mode: Mutex<SendMode>,
    peer: Option<(SocketAddr, mpsc::Sender<TransportEvent>)>,
    closed: AtomicBool,
    gate: Notify,
    parked: AtomicUsize,
}

impl MemoryTransport {
    /// A transport that records datagrams without delivering them anywhere
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            sent: Mutex::new(Vec::new()),
            mode: Mutex::new(SendMode::Normal),
            peer: None,
            closed: AtomicBool::new(false),
            gate: Notify::new(),
            parked: AtomicUsize::new(0),
        }
    }

    /// Two transports wired back to back. Datagrams sent by one to the
    /// other's address show up as `PacketReceived` on the other's channel.
    pub fn pair(
        a: SocketAddr,
        b: SocketAddr,
    ) -> (
        (Self, mpsc::Receiver<TransportEvent>),
        (Self, mpsc::Receiver<TransportEvent>),
    ) {
        let (a_tx, a_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (b_tx, b_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let mut first = Self::new(a);
        first.peer = Some((b, b_tx));
        let mut second = Self::new(b);
        second.peer = Some((a, a_tx));

        ((first, a_rx), (second, b_rx))
    }

    pub fn set_mode(&self, mode: SendMode) {
        *self.mode.lock() = mode;
    }

    /// Lets one parked (or the next gated) send through
    pub fn release(&self) {
        self.gate.notify_one();
    }

    /// Sends currently parked in `Gated` mode
    pub fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Acquire)
    }

    /// Every datagram sent so far, oldest first
    pub fn sent(&self) -> Vec<SentDatagram> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn transmit(&self, payload: Bytes, destination: SocketAddr) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        let mode = *self.mode.lock();
        match mode {
            SendMode::ZeroBytes => {
                debug!("Memory transport dropping datagram to {} (zero bytes)", destination);
                return Ok(0);
            }
            SendMode::Error => {
                return Err(Error::SendFailed(
                    destination,
                    std::io::Error::new(std::io::ErrorKind::Other, "simulated send failure"),
                ));
            }
            SendMode::Gated => {
                self.parked.fetch_add(1, Ordering::AcqRel);
                trace!("Memory transport parking send to {}", destination);
                self.gate.notified().await;
                self.parked.fetch_sub(1, Ordering::AcqRel);
            }
            SendMode::Normal => {}
        }

        let len = payload.len();
        self.sent.lock().push(SentDatagram {
            payload: payload.clone(),
            destination,
        });
        trace!("Memory transport recorded {} bytes to {}", len, destination);

        if let Some((peer_addr, peer_tx)) = &self.peer {
            if *peer_addr == destination {
                let event = TransportEvent::PacketReceived {
                    data: payload,
                    source: self.local_addr,
                    destination,
                };
                peer_tx.send(event).await?;
            }
        }

        Ok(len)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryTransport({})", self.local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_records_and_fails_on_demand() {
        let transport = MemoryTransport::new(addr("127.0.0.1:4000"));
        let dest = addr("127.0.0.1:5000");

        assert_eq!(transport.transmit(Bytes::from_static(b"abc"), dest).await.unwrap(), 3);

        transport.set_mode(SendMode::ZeroBytes);
        assert_eq!(transport.transmit(Bytes::from_static(b"abc"), dest).await.unwrap(), 0);

        transport.set_mode(SendMode::Error);
        assert!(matches!(
            transport.transmit(Bytes::from_static(b"abc"), dest).await,
            Err(Error::SendFailed(d, _)) if d == dest
        ));

        assert_eq!(transport.sent_count(), 1);
        assert_eq!(transport.sent()[0].destination, dest);
    }

    #[tokio::test]
    async fn test_gated_send_waits_for_release() {
        let transport = Arc::new(MemoryTransport::new(addr("127.0.0.1:4000")));
        transport.set_mode(SendMode::Gated);

        let sender = transport.clone();
        let send = tokio::spawn(async move { sender.transmit(Bytes::from_static(b"held"), addr("127.0.0.1:5000")).await });

        while transport.parked_count() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.sent_count(), 0);

        transport.release();
        assert_eq!(send.await.unwrap().unwrap(), 4);
        assert_eq!(transport.parked_count(), 0);
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_pair_delivers_to_peer() {
        let a = addr("127.0.0.1:4000");
        let b = addr("127.0.0.1:5000");
        let ((left, _left_rx), (_right, mut right_rx)) = MemoryTransport::pair(a, b);

        left.transmit(Bytes::from_static(b"hi"), b).await.unwrap();

        match right_rx.recv().await {
            Some(TransportEvent::PacketReceived { data, source, destination }) => {
                assert_eq!(&data[..], b"hi");
                assert_eq!(source, a);
                assert_eq!(destination, b);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
