//! # Transactions
//!
//! A [`Transaction`] is one bounded request/response exchange with a single
//! peer over a shared [`PacketSocket`]. It sends a request, retransmits it on
//! timeout while its retry budget lasts, and resolves to exactly one terminal
//! state:
//!
//! - `Success` when a correlated response arrives,
//! - `Failed` when sending fails or the budget runs out,
//! - `Cancelled` when the owner calls [`Transaction::cancel`].
//!
//! ## Components
//!
//! ```text
//!                     ┌───────────────────────────────────────────┐
//!  initiate()/cancel()│               Transaction                 │
//!  ──────────────────▶│  state machine (state.rs)                 │
//!                     │    ├─ retry/timeout driver (runner.rs)    │
//!                     │    │    └─ RetryTimer (timer.rs)          │
//!                     │    ├─ Correlator (correlation.rs)         │
//!                     │    └─ CompletionNotifier (notifier.rs)    │
//!                     └───────────────▲───────────────────────────┘
//!                                     │ InterceptAdapter (intercept.rs)
//!                     ┌───────────────┴───────────────────────────┐
//!                     │     PacketSocket (priority dispatch)      │
//!                     └───────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Timer callbacks, packet dispatch and owner calls can arrive from different
//! tasks. Every state transition happens atomically under the transaction's
//! lock after checking the current state, so whichever path reaches the lock
//! first decides the terminal state and the others become no-ops. No lock is
//! held across an await or while subscriber callbacks run.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pktx_transport::{PacketSocket, RawPacket, bind_udp};
//! use pktx_transaction_core::{TransactionBuilder, TransactionState};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (transport, events) = bind_udp("0.0.0.0:0".parse()?).await?;
//! let socket = Arc::new(PacketSocket::<RawPacket>::new(Arc::new(transport)));
//! let (_dispatch, _unclaimed) = socket.spawn_dispatch_loop(events);
//!
//! let transaction = TransactionBuilder::new(socket, "192.0.2.10:3478".parse()?, RawPacket::from("hello"))
//!     .timeout(Duration::from_millis(500))
//!     .retries(3)
//!     .build()?;
//!
//! transaction.initiate().await?;
//! let response = transaction.outcome().await?;
//! assert_eq!(transaction.state(), TransactionState::Success);
//! println!("response: {:?}", response);
//! transaction.dispose()?;
//! # Ok(())
//! # }
//! ```

pub mod correlation;
pub(crate) mod intercept;
pub mod notifier;
pub mod policy;
mod runner;
pub mod state;
pub mod timer;

pub use correlation::{AddressOnly, Correlation, Correlator, ResponseMatcher};
pub use notifier::CompletionNotifier;
pub use policy::RetryPolicy;
pub use state::{FailureReason, TransactionState};
pub use timer::RetryTimer;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use pktx_transport::{ListenerId, Packet, PacketSocket};
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, error, trace};
use uuid::Uuid;

use crate::config::TransactionConfig;
use crate::error::{Error, Result};
use intercept::InterceptAdapter;

/// Unique identifier of a transaction, used in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

/// Mutable state, only touched under `TransactionInner::core`
pub(crate) struct Core<P> {
    pub(crate) state: TransactionState,
    pub(crate) started: bool,
    pub(crate) disposed: bool,
    pub(crate) policy: RetryPolicy,
    pub(crate) timer: RetryTimer,
    pub(crate) listener: Option<ListenerId>,
    pub(crate) response: Option<P>,
    pub(crate) failure: Option<FailureReason>,
    pub(crate) transmissions: u32,
    pub(crate) created_at: Instant,
    pub(crate) last_attempt_at: Option<Instant>,
}

pub(crate) struct TransactionInner<P: Packet> {
    pub(crate) id: TransactionId,
    pub(crate) socket: Arc<PacketSocket<P>>,
    pub(crate) peer_addr: SocketAddr,
    pub(crate) request: P,
    pub(crate) config: TransactionConfig,
    pub(crate) correlator: Correlator<P>,
    pub(crate) notifier: CompletionNotifier<P>,
    state_tx: watch::Sender<TransactionState>,
    disposed_tx: watch::Sender<bool>,
    pub(crate) core: Mutex<Core<P>>,
}

impl<P: Packet> TransactionInner<P> {
    /// Moves a pending transaction to `next`, disarming its timer.
    ///
    /// Returns false, changing nothing, when the transition is not allowed;
    /// this is how a late timer or packet loses to an earlier transition.
    pub(crate) fn finalize(
        &self,
        core: &mut Core<P>,
        next: TransactionState,
        failure: Option<FailureReason>,
    ) -> bool {
        if !core.state.can_transition_to(next) {
            trace!(id = %self.id, state = %core.state, requested = %next, "Ignoring transition");
            return false;
        }

        let previous = core.state;
        core.state = next;
        core.failure = failure;
        core.timer.disarm();
        self.state_tx.send_replace(next);
        debug!(id = %self.id, peer = %self.peer_addr, "State changed from {} to {}", previous, next);
        true
    }

    fn ensure_live(&self, core: &Core<P>, operation: &'static str) -> Result<()> {
        if core.disposed {
            error!(id = %self.id, operation, "Transaction used after dispose");
            return Err(Error::Disposed);
        }
        Ok(())
    }

    fn ensure_pending(&self, core: &Core<P>, operation: &'static str) -> Result<()> {
        if core.state.is_terminal() {
            return Err(Error::InvalidState {
                operation,
                state: core.state,
            });
        }
        Ok(())
    }

    /// Maps a terminal state to the caller-facing result
    fn terminal_result(&self, core: &Core<P>) -> Result<P> {
        match core.state {
            TransactionState::Success => core.response.clone().ok_or(Error::InvalidState {
                operation: "read the response of",
                state: core.state,
            }),
            TransactionState::Failed => Err(match &core.failure {
                Some(FailureReason::TransmitFailed(reason)) => Error::TransmitFailed {
                    destination: self.peer_addr,
                    reason: reason.clone(),
                },
                Some(FailureReason::Timeout { attempts }) => Error::Timeout {
                    peer: self.peer_addr,
                    attempts: *attempts,
                },
                None => Error::InvalidState {
                    operation: "read the failure of",
                    state: core.state,
                },
            }),
            TransactionState::Cancelled => Err(Error::Cancelled),
            TransactionState::Pending => Err(Error::InvalidState {
                operation: "read the outcome of",
                state: core.state,
            }),
        }
    }
}

/// A single request/response exchange with one peer.
///
/// The handle owns the transaction's listener registration and timer. It is
/// not `Clone`; share it behind an `Arc` when several tasks need it. Dropping
/// a handle that was never disposed disposes it.
pub struct Transaction<P: Packet> {
    inner: Arc<TransactionInner<P>>,
}

impl<P: Packet> Transaction<P> {
    /// Creates an address-matched transaction and registers it on `socket`.
    pub fn new(
        socket: Arc<PacketSocket<P>>,
        peer_addr: SocketAddr,
        request: P,
        config: TransactionConfig,
    ) -> Result<Self> {
        Self::with_matcher(socket, peer_addr, request, config, Box::new(AddressOnly))
    }

    /// Creates a transaction whose responses must also satisfy `matcher`.
    pub fn with_matcher(
        socket: Arc<PacketSocket<P>>,
        peer_addr: SocketAddr,
        request: P,
        config: TransactionConfig,
        matcher: Box<dyn ResponseMatcher<P>>,
    ) -> Result<Self> {
        config.validate()?;
        let local_addr = socket.local_addr()?;
        let id = TransactionId::new();
        let (state_tx, _) = watch::channel(TransactionState::Pending);
        let (disposed_tx, _) = watch::channel(false);

        let inner = Arc::new(TransactionInner {
            id,
            socket: socket.clone(),
            peer_addr,
            request,
            correlator: Correlator::new(local_addr, peer_addr, matcher),
            notifier: CompletionNotifier::new(),
            state_tx,
            disposed_tx,
            core: Mutex::new(Core {
                state: TransactionState::Pending,
                started: false,
                disposed: false,
                policy: RetryPolicy::new(config.timeout, config.retries),
                timer: RetryTimer::new(),
                listener: None,
                response: None,
                failure: None,
                transmissions: 0,
                created_at: Instant::now(),
                last_attempt_at: None,
            }),
            config,
        });

        let adapter = Arc::new(InterceptAdapter::new(Arc::downgrade(&inner)));
        let listener = socket.add_listener(adapter, inner.config.listener_priority);
        inner.core.lock().listener = Some(listener);

        debug!(
            id = %id,
            peer = %peer_addr,
            local = %local_addr,
            timeout = ?inner.config.timeout,
            retries = inner.config.retries,
            "Create"
        );

        Ok(Self { inner })
    }

    /// Sends the request and arms the retry timer.
    ///
    /// Single-shot: a second call fails with [`Error::AlreadyInitiated`].
    /// If the transport writes nothing the transaction finalizes to
    /// `Failed` without consuming a retry.
    pub async fn initiate(&self) -> Result<()> {
        {
            let mut core = self.inner.core.lock();
            self.inner.ensure_live(&core, "initiate")?;
            if core.started {
                error!(id = %self.inner.id, "Transaction initiated twice");
                return Err(Error::AlreadyInitiated);
            }
            if core.state != TransactionState::Pending {
                return Err(Error::InvalidState {
                    operation: "initiate",
                    state: core.state,
                });
            }
            core.started = true;
            core.last_attempt_at = Some(Instant::now());
        }

        debug!(id = %self.inner.id, peer = %self.inner.peer_addr, "Send");
        let result = self.inner.transmit().await;

        let mut core = self.inner.core.lock();
        match result {
            Ok(_) => {
                self.inner.on_transmitted(&mut core);
                Ok(())
            }
            Err(e) => {
                let reason = match &e {
                    Error::TransmitFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                self.inner.finalize(
                    &mut core,
                    TransactionState::Failed,
                    Some(FailureReason::TransmitFailed(reason)),
                );
                Err(e)
            }
        }
    }

    /// Cancels a pending transaction.
    ///
    /// Once this returns the transaction is `Cancelled` and its timer is
    /// disarmed; a response or timeout racing with the call is ignored.
    pub fn cancel(&self) -> Result<()> {
        let mut core = self.inner.core.lock();
        self.inner.ensure_live(&core, "cancel")?;
        if core.state != TransactionState::Pending {
            return Err(Error::InvalidState {
                operation: "cancel",
                state: core.state,
            });
        }
        debug!(id = %self.inner.id, "Cancel");
        self.inner.finalize(&mut core, TransactionState::Cancelled, None);
        Ok(())
    }

    /// Detaches the transaction from its socket and releases its timer.
    ///
    /// Valid in any state. A second call fails with [`Error::Disposed`]
    /// without touching the socket again.
    pub fn dispose(&self) -> Result<()> {
        let listener = {
            let mut core = self.inner.core.lock();
            self.inner.ensure_live(&core, "dispose")?;
            core.disposed = true;
            core.timer.disarm();
            core.listener.take()
        };

        if let Some(id) = listener {
            self.inner.socket.remove_listener(id);
        }
        self.inner.disposed_tx.send_replace(true);
        debug!(id = %self.inner.id, "Dispose");
        Ok(())
    }

    /// Waits for the transaction to settle.
    ///
    /// Resolves to the response on `Success`, and to the matching error on
    /// `Failed` or `Cancelled`. Disposal while waiting yields
    /// [`Error::Disposed`].
    pub async fn outcome(&self) -> Result<P> {
        let mut state_rx = self.inner.state_tx.subscribe();
        let mut disposed_rx = self.inner.disposed_tx.subscribe();
        {
            let core = self.inner.core.lock();
            self.inner.ensure_live(&core, "await")?;
        }

        let settled = async {
            state_rx
                .wait_for(|state| state.is_terminal())
                .await
                .map(|state| *state)
        };
        let disposed = async { disposed_rx.wait_for(|disposed| *disposed).await.map(|_| ()) };

        tokio::select! {
            settled = settled => {
                if settled.is_err() {
                    return Err(Error::Disposed);
                }
            }
            _ = disposed => return Err(Error::Disposed),
        }

        let core = self.inner.core.lock();
        self.inner.terminal_result(&core)
    }

    /// A receiver for the response, published once on `Success`.
    ///
    /// Subscribe before [`initiate`](Self::initiate); once the transaction
    /// has settled this fails with [`Error::InvalidState`], since nothing
    /// will be published any more. Read a settled response with
    /// [`response`](Self::response) or [`outcome`](Self::outcome).
    pub fn subscribe(&self) -> Result<broadcast::Receiver<P>> {
        let core = self.inner.core.lock();
        self.inner.ensure_live(&core, "subscribe to")?;
        self.inner.ensure_pending(&core, "subscribe to")?;
        Ok(self.inner.notifier.subscribe())
    }

    /// Registers a callback run once, synchronously, with the response.
    ///
    /// Fails with [`Error::InvalidState`] once the transaction has settled.
    pub fn on_response<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let core = self.inner.core.lock();
        self.inner.ensure_live(&core, "subscribe to")?;
        self.inner.ensure_pending(&core, "subscribe to")?;
        if !self.inner.notifier.add_handler(handler) {
            return Err(Error::InvalidState {
                operation: "subscribe to",
                state: core.state,
            });
        }
        Ok(())
    }

    /// Follows every state transition
    pub fn state_changes(&self) -> watch::Receiver<TransactionState> {
        self.inner.state_tx.subscribe()
    }

    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Address of the socket the transaction is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.correlator.local_addr()
    }

    pub fn request(&self) -> &P {
        &self.inner.request
    }

    pub fn response(&self) -> Option<P> {
        self.inner.core.lock().response.clone()
    }

    pub fn state(&self) -> TransactionState {
        self.inner.core.lock().state
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.inner.core.lock().failure.clone()
    }

    /// Retransmissions performed so far
    pub fn retry_count(&self) -> u32 {
        self.inner.core.lock().policy.retries()
    }

    /// Successful sends, the first attempt included
    pub fn transmissions(&self) -> u32 {
        self.inner.core.lock().transmissions
    }

    pub fn created_at(&self) -> Instant {
        self.inner.core.lock().created_at
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.inner.core.lock().last_attempt_at
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.inner.config
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.core.lock().disposed
    }

    pub fn is_timer_armed(&self) -> bool {
        self.inner.core.lock().timer.is_armed()
    }

    /// The listener registration held on the socket, if not yet disposed
    pub fn listener_id(&self) -> Option<ListenerId> {
        self.inner.core.lock().listener
    }
}

impl<P: Packet> Drop for Transaction<P> {
    fn drop(&mut self) {
        let disposed = self.inner.core.lock().disposed;
        if !disposed {
            trace!(id = %self.inner.id, "Disposing on drop");
            let _ = self.dispose();
        }
    }
}

impl<P: Packet> fmt::Debug for Transaction<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("state", &core.state)
            .field("retries", &core.policy.retries())
            .field("disposed", &core.disposed)
            .finish()
    }
}
