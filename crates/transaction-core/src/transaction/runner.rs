/// # Retry/Timeout Driver
///
/// Drives a pending transaction through its retransmission schedule. Each
/// transmission arms the transaction's [`RetryTimer`](super::timer::RetryTimer)
/// for one timeout period. When the timer fires:
///
/// 1. A stale callback (re-armed, disarmed, or the transaction already left
///    `Pending`) does nothing.
/// 2. With retries remaining, one retry is consumed, the original request is
///    sent again unchanged and the timer is re-armed.
/// 3. With the budget spent, the transaction finalizes to `Failed`.
///
/// The state is re-checked after every await, so a cancel or a response that
/// lands while a retransmission is on the wire wins over the driver.
use std::sync::Arc;

use pktx_transport::Packet;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::transaction::state::FailureReason;
use crate::transaction::{Core, TransactionInner, TransactionState};

impl<P: Packet> TransactionInner<P> {
    /// Sends the request once. Zero bytes written counts as a failure.
    pub(crate) async fn transmit(&self) -> Result<usize> {
        let failed = |reason: String| Error::TransmitFailed {
            destination: self.peer_addr,
            reason,
        };

        match self.socket.send_packet(&self.request, self.peer_addr).await {
            Ok(0) => Err(failed("transport wrote 0 bytes".to_string())),
            Ok(sent) => Ok(sent),
            Err(e) => Err(failed(e.to_string())),
        }
    }

    /// Arms the retry timer for one timeout period from now.
    pub(crate) fn arm_timer(self: &Arc<Self>, core: &mut Core<P>) {
        let weak = Arc::downgrade(self);
        let timeout = core.policy.timeout();
        let epoch = core.timer.arm(timeout, move |epoch| async move {
            if let Some(inner) = weak.upgrade() {
                inner.on_timer_fired(epoch).await;
            }
        });
        trace!(id = %self.id, epoch, ?timeout, "Retry timer armed");
    }

    /// Records a successful transmission and, if still pending, re-arms.
    pub(crate) fn on_transmitted(self: &Arc<Self>, core: &mut Core<P>) {
        core.transmissions += 1;
        if core.state == TransactionState::Pending && !core.disposed {
            self.arm_timer(core);
        } else {
            trace!(id = %self.id, state = %core.state, "Not re-arming, transaction settled while sending");
        }
    }

    async fn on_timer_fired(self: Arc<Self>, epoch: u64) {
        {
            let mut core = self.core.lock();
            if !core.timer.release_fired(epoch) {
                trace!(id = %self.id, epoch, "Ignoring stale timer");
                return;
            }
            if core.disposed || core.state != TransactionState::Pending {
                return;
            }

            if !core.policy.consume() {
                let attempts = core.transmissions;
                debug!(id = %self.id, attempts, "Retries exhausted");
                self.finalize(&mut core, TransactionState::Failed, Some(FailureReason::Timeout { attempts }));
                return;
            }

            core.last_attempt_at = Some(Instant::now());
            debug!(
                id = %self.id,
                retry = core.policy.retries(),
                max = core.policy.max_retries(),
                "Retransmitting request"
            );
        }

        let result = self.transmit().await;

        let mut core = self.core.lock();
        match result {
            Ok(_) => self.on_transmitted(&mut core),
            Err(e) => {
                debug!(id = %self.id, error = %e, "Retransmission failed");
                let reason = match e {
                    Error::TransmitFailed { reason, .. } => reason,
                    other => other.to_string(),
                };
                self.finalize(&mut core, TransactionState::Failed, Some(FailureReason::TransmitFailed(reason)));
            }
        }
    }
}
