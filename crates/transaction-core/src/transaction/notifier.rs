//! Completion notifier: publishes a transaction's response exactly once.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use pktx_transport::Packet;

// A notifier publishes at most one value
const BROADCAST_CAPACITY: usize = 1;

type ResponseHandler<P> = Box<dyn Fn(&P) + Send + Sync>;

/// Fan-out of the resolved response to broadcast receivers and callbacks.
pub struct CompletionNotifier<P: Packet> {
    tx: broadcast::Sender<P>,
    handlers: Mutex<Vec<ResponseHandler<P>>>,
    fired: AtomicBool,
}

impl<P: Packet> CompletionNotifier<P> {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            handlers: Mutex::new(Vec::new()),
            fired: AtomicBool::new(false),
        }
    }

    /// A receiver for the response. Only sees a response published after
    /// this call.
    pub fn subscribe(&self) -> broadcast::Receiver<P> {
        self.tx.subscribe()
    }

    /// Registers a callback run synchronously when the response is published.
    ///
    /// Returns false, dropping the handler, once the response has already
    /// been published.
    pub fn add_handler<F>(&self, handler: F) -> bool
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.lock();
        // Checked under the handlers lock: `notify` takes the list only after
        // setting `fired`, so an accepted handler is always called
        if self.has_fired() {
            return false;
        }
        handlers.push(Box::new(handler));
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Publishes `response`. A second call publishes nothing and returns false.
    pub fn notify(&self, response: &P) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            warn!("Completion notifier fired twice, ignoring");
            return false;
        }

        let receivers = self.tx.send(response.clone()).unwrap_or(0);

        // Handlers run without the lock held so they may register more
        let handlers = std::mem::take(&mut *self.handlers.lock());
        for handler in &handlers {
            handler(response);
        }

        trace!(receivers, handlers = handlers.len(), "Response published");
        true
    }
}

impl<P: Packet> Default for CompletionNotifier<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Packet> fmt::Debug for CompletionNotifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionNotifier")
            .field("receivers", &self.tx.receiver_count())
            .field("fired", &self.has_fired())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktx_transport::RawPacket;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_fires_exactly_once() {
        let notifier = CompletionNotifier::<RawPacket>::new();
        let mut first = notifier.subscribe();
        let mut second = notifier.subscribe();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        assert!(notifier.add_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(notifier.notify(&RawPacket::from("one")));
        assert!(!notifier.notify(&RawPacket::from("two")));

        assert_eq!(first.try_recv().unwrap(), RawPacket::from("one"));
        assert_eq!(second.try_recv().unwrap(), RawPacket::from("one"));
        assert!(first.try_recv().is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(notifier.has_fired());
    }

    #[test]
    fn test_late_handler_rejected() {
        let notifier = CompletionNotifier::<RawPacket>::new();
        assert!(notifier.notify(&RawPacket::from("done")));

        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        assert!(!notifier.add_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!notifier.notify(&RawPacket::from("again")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = CompletionNotifier::<RawPacket>::new();
        assert!(notifier.notify(&RawPacket::from("nobody listening")));
    }
}
