//! Priority-ordered listener registry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::packet::{Packet, ReceivedPacket};

/// What a listener did with an offered packet.
///
/// `Consumed` ends dispatch of that one delivery; later deliveries are
/// unaffected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The packet was not for this listener; offer it to the next one
    Continue,
    /// The packet was claimed; do not offer it to any further listener
    Consumed,
}

impl DispatchOutcome {
    pub fn is_consumed(self) -> bool {
        self == DispatchOutcome::Consumed
    }
}

/// A consumer of packets delivered on a shared socket.
///
/// Called from the socket's dispatch context; implementations must not block.
pub trait PacketListener<P: Packet>: Send + Sync {
    fn on_packet(&self, received: &ReceivedPacket<P>) -> DispatchOutcome;
}

impl<P, F> PacketListener<P> for F
where
    P: Packet,
    F: Fn(&ReceivedPacket<P>) -> DispatchOutcome + Send + Sync,
{
    fn on_packet(&self, received: &ReceivedPacket<P>) -> DispatchOutcome {
        self(received)
    }
}

/// Token identifying one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Registration<P: Packet> {
    id: ListenerId,
    priority: i32,
    listener: Arc<dyn PacketListener<P>>,
}

/// Listeners kept sorted by descending priority. Equal priorities keep
/// registration order, since ids are handed out monotonically.
pub(crate) struct ListenerSet<P: Packet> {
    entries: RwLock<Vec<Registration<P>>>,
    next_id: AtomicU64,
}

impl<P: Packet> ListenerSet<P> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn insert(&self, listener: Arc<dyn PacketListener<P>>, priority: i32) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.write();
        // After every entry with priority >= ours
        let index = entries.partition_point(|entry| entry.priority >= priority);
        entries.insert(
            index,
            Registration {
                id,
                priority,
                listener,
            },
        );
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.read().iter().any(|entry| entry.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Listeners in dispatch order, detached from the lock
    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Arc<dyn PacketListener<P>>)> {
        self.entries
            .read()
            .iter()
            .map(|entry| (entry.id, entry.listener.clone()))
            .collect()
    }

    pub(crate) fn priorities(&self) -> Vec<i32> {
        self.entries.read().iter().map(|entry| entry.priority).collect()
    }
}
