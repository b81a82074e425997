//! Packet interception.
//!
//! Makes a transaction visible to its shared socket as a high-priority
//! [`PacketListener`]. Deliveries that answer the transaction are claimed
//! with [`DispatchOutcome::Consumed`] so no lower-priority listener sees
//! them; everything else passes through untouched.

use std::sync::Weak;

use pktx_transport::{DispatchOutcome, Packet, PacketListener, ReceivedPacket};
use tracing::trace;

use crate::transaction::{Core, TransactionInner, TransactionState};
use crate::transaction::correlation::Correlation;

/// Listener registered on the socket on behalf of one transaction.
///
/// Holds the transaction weakly: the socket must never keep a transaction
/// alive.
pub(crate) struct InterceptAdapter<P: Packet> {
    inner: Weak<TransactionInner<P>>,
}

impl<P: Packet> InterceptAdapter<P> {
    pub(crate) fn new(inner: Weak<TransactionInner<P>>) -> Self {
        Self { inner }
    }
}

impl<P: Packet> PacketListener<P> for InterceptAdapter<P> {
    fn on_packet(&self, received: &ReceivedPacket<P>) -> DispatchOutcome {
        match self.inner.upgrade() {
            Some(inner) => inner.handle_packet(received),
            None => DispatchOutcome::Continue,
        }
    }
}

impl<P: Packet> TransactionInner<P> {
    /// Offers one delivery to the transaction.
    ///
    /// Only a pending, initiated, live transaction can be answered. The
    /// correlator, and with it any user matcher, runs without the state lock
    /// held; the state is checked again before finalizing. On a match the
    /// transaction finalizes to Success, the notifier fires after the lock is
    /// released, and the delivery is claimed.
    pub(crate) fn handle_packet(&self, received: &ReceivedPacket<P>) -> DispatchOutcome {
        if !self.accepts_responses(&self.core.lock()) {
            return DispatchOutcome::Continue;
        }

        match self.correlator.check_response(&self.request, received) {
            Correlation::Matched => {}
            other => {
                trace!(id = %self.id, result = ?other, "Packet does not answer transaction");
                return DispatchOutcome::Continue;
            }
        }

        let response = {
            let mut core = self.core.lock();
            // Settled or disposed while the matcher ran
            if !self.accepts_responses(&core) {
                return DispatchOutcome::Continue;
            }
            core.response = Some(received.packet.clone());
            self.finalize(&mut core, TransactionState::Success, None);
            received.packet.clone()
        };

        trace!(id = %self.id, size = response.size(), "On success");
        self.notifier.notify(&response);
        DispatchOutcome::Consumed
    }

    fn accepts_responses(&self, core: &Core<P>) -> bool {
        !core.disposed && core.started && core.state == TransactionState::Pending
    }
}
