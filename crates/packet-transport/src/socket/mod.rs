//! Shared packet socket with priority-ordered listener dispatch.
//!
//! A [`PacketSocket`] wraps one [`Transport`] that many independent consumers
//! use at once. Inbound deliveries are offered to registered
//! [`PacketListener`]s in descending priority order; the first listener to
//! answer [`DispatchOutcome::Consumed`] ends dispatch of that delivery.
//!
//! ```text
//!  Transport ──events──▶ dispatch loop ──decode──▶ ReceivedPacket
//!                                                   │
//!                          priority 100 ◀───────────┤  Continue
//!                          priority  50 ◀───────────┤  Continue
//!                          priority   0 ◀───────────┘  Consumed ─▶ stop
//!                                                   │
//!                      (nobody consumed) ──────────▶ unclaimed channel
//! ```

mod listeners;

pub use listeners::{DispatchOutcome, ListenerId, PacketListener};

use std::fmt;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::packet::{Packet, PacketInfo, ReceivedPacket};
use crate::transport::{Transport, TransportEvent};

use listeners::ListenerSet;

// Capacity of the channel carrying packets no listener claimed
const UNCLAIMED_CHANNEL_CAPACITY: usize = 100;

/// A transport shared by many packet listeners.
pub struct PacketSocket<P: Packet> {
    transport: Arc<dyn Transport>,
    listeners: ListenerSet<P>,
    _packet: PhantomData<fn() -> P>,
}

impl<P: Packet> PacketSocket<P> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            listeners: ListenerSet::new(),
            _packet: PhantomData,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Address of the underlying transport
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Encodes `packet` and transmits it, returning the bytes written
    pub async fn send_packet(&self, packet: &P, destination: SocketAddr) -> Result<usize> {
        self.transport.transmit(packet.encode(), destination).await
    }

    /// Registers a listener. Higher priorities are offered packets first.
    pub fn add_listener(&self, listener: Arc<dyn PacketListener<P>>, priority: i32) -> ListenerId {
        let id = self.listeners.insert(listener, priority);
        debug!(%id, priority, "Listener registered");
        id
    }

    /// Removes a registration, returning whether it was present
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed {
            debug!(%id, "Listener unregistered");
        } else {
            trace!(%id, "Listener was not registered");
        }
        removed
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Registered priorities in dispatch order
    pub fn listener_priorities(&self) -> Vec<i32> {
        self.listeners.priorities()
    }

    /// Offers one delivery to every listener, highest priority first,
    /// stopping at the first one that consumes it.
    ///
    /// The listener set is snapshotted up front, so listeners may register
    /// or unregister from inside their callback.
    pub fn dispatch(&self, received: &ReceivedPacket<P>) -> DispatchOutcome {
        for (id, listener) in self.listeners.snapshot() {
            if listener.on_packet(received).is_consumed() {
                trace!(%id, "Packet consumed, stopping dispatch");
                return DispatchOutcome::Consumed;
            }
        }
        DispatchOutcome::Continue
    }

    /// Drives dispatch from a transport's event channel.
    ///
    /// Every `PacketReceived` event is decoded, annotated with its routing
    /// metadata and dispatched. Deliveries nobody consumed are forwarded on
    /// the returned channel; when that channel is full or its receiver is
    /// gone they are dropped, so an unread receiver never holds up dispatch
    /// to the listeners. The task ends when the transport reports `Closed`
    /// or its channel closes.
    pub fn spawn_dispatch_loop(
        self: &Arc<Self>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) -> (JoinHandle<()>, mpsc::Receiver<ReceivedPacket<P>>) {
        let (unclaimed_tx, unclaimed_rx) = mpsc::channel(UNCLAIMED_CHANNEL_CAPACITY);
        let socket = self.clone();

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    TransportEvent::PacketReceived {
                        data,
                        source,
                        destination,
                    } => {
                        let packet = match P::decode(&data) {
                            Ok(packet) => packet,
                            Err(e) => {
                                warn!(%source, "Dropping undecodable packet: {}", e);
                                continue;
                            }
                        };
                        let received = ReceivedPacket::new(packet, PacketInfo::new(destination, source));

                        if socket.dispatch(&received).is_consumed() {
                            continue;
                        }
                        // Never wait on the unclaimed reader; dispatch must keep flowing
                        match unclaimed_tx.try_send(received) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(dropped)) => {
                                warn!(
                                    peer = ?dropped.peer_addr(),
                                    "Unclaimed channel full, dropping packet"
                                );
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                trace!("Unclaimed receiver dropped, discarding packet");
                            }
                        }
                    }
                    TransportEvent::Error { error } => {
                        warn!("Transport reported error: {}", error);
                    }
                    TransportEvent::Closed => {
                        debug!("Transport closed, stopping dispatch loop");
                        break;
                    }
                }
            }
        });

        (handle, unclaimed_rx)
    }
}

impl<P: Packet> fmt::Debug for PacketSocket<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketSocket")
            .field("transport", &self.transport)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
