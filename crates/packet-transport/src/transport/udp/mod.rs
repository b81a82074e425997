mod listener;
mod sender;

pub use listener::UdpListener;
pub use sender::UdpSender;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

// Default channel capacity
const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// UDP transport: one socket shared by a receive loop and a sender
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpTransportInner>,
}

struct UdpTransportInner {
    sender: UdpSender,
    listener: Arc<UdpListener>,
    closed: AtomicBool,
    events_tx: mpsc::Sender<TransportEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl UdpTransport {
    /// Creates a new UDP transport bound to the specified address.
    ///
    /// Inbound datagrams are published on the returned channel until the
    /// transport is closed or the receiver is dropped.
    pub async fn bind(
        addr: SocketAddr,
        channel_capacity: Option<usize>,
    ) -> Result<(Self, mpsc::Receiver<TransportEvent>)> {
        let capacity = channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(capacity);

        let listener = UdpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("UDP transport bound to {}", local_addr);

        let sender = UdpSender::new(listener.clone_socket())?;
        let (shutdown_tx, _) = watch::channel(false);

        let transport = UdpTransport {
            inner: Arc::new(UdpTransportInner {
                sender,
                listener: Arc::new(listener),
                closed: AtomicBool::new(false),
                events_tx,
                shutdown_tx,
            }),
        };

        transport.spawn_receive_loop();

        Ok((transport, events_rx))
    }

    // Spawns a task to receive datagrams from the UDP socket
    fn spawn_receive_loop(&self) {
        let inner = self.inner.clone();
        let mut shutdown_rx = inner.shutdown_tx.subscribe();

        tokio::spawn(async move {
            loop {
                let result = tokio::select! {
                    result = inner.listener.receive() => result,
                    _ = shutdown_rx.changed() => break,
                };

                match result {
                    Ok((data, source, destination)) => {
                        debug!("Received {} byte datagram from {}", data.len(), source);
                        let event = TransportEvent::PacketReceived {
                            data,
                            source,
                            destination,
                        };
                        if inner.events_tx.send(event).await.is_err() {
                            debug!("Event receiver dropped, stopping UDP receive loop");
                            break;
                        }
                    }
                    Err(e) => {
                        if inner.closed.load(Ordering::Acquire) {
                            break;
                        }
                        error!("Error receiving UDP datagram: {}", e);
                        let _ = inner
                            .events_tx
                            .send(TransportEvent::Error {
                                error: e.to_string(),
                            })
                            .await;
                    }
                }
            }

            let _ = inner.events_tx.send(TransportEvent::Closed).await;
            info!("UDP receive loop terminated");
        });
    }
}

#[async_trait::async_trait]
impl Transport for UdpTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.listener.local_addr()
    }

    async fn transmit(&self, payload: Bytes, destination: SocketAddr) -> Result<usize> {
        if self.is_closed() {
            return Err(Error::TransportClosed);
        }

        debug!("Sending {} byte datagram to {}", payload.len(), destination);
        self.inner.sender.send(&payload, destination).await
    }

    async fn close(&self) -> Result<()> {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            let _ = self.inner.shutdown_tx.send(true);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Ok(addr) = self.inner.listener.local_addr() {
            write!(f, "UdpTransport({})", addr)
        } else {
            write!(f, "UdpTransport(<e>)")
        }
    }
}
