/// # Transaction State Machine
///
/// Every transaction starts in `Pending` and ends in exactly one of the three
/// terminal states. There are no transitions out of a terminal state.
///
/// ```text
///          initiate(): send fails
///     (new) ─────────────────────────────────────────┐
///       │                                            │
///       │ initiate(): send ok, timer armed           │
///       ▼                                            ▼
///  ┌─────────┐   matching packet    ┌─────────┐  ┌────────┐
///  │ Pending │─────────────────────▶│ Success │  │ Failed │
///  └─────────┘                      └─────────┘  └────────┘
///    │  ▲  │                                         ▲
///    │  │  │ timeout, retries exhausted              │
///    │  │  └─────────────────────────────────────────┘
///    │  │
///    │  └── timeout, retries remain: retransmit, re-arm
///    │
///    │ cancel()
///    ▼
///  ┌───────────┐
///  │ Cancelled │
///  └───────────┘
/// ```
///
/// The state is only ever changed under the owning transaction's lock, so a
/// timer callback and a packet callback racing for the same transaction
/// observe each other's transition and exactly one terminal state wins.
use std::fmt;

/// Lifecycle state of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Waiting for a response; the only non-terminal state
    Pending,
    /// A correlated response was received
    Success,
    /// The request could not be sent or no response arrived in time
    Failed,
    /// The owner cancelled the transaction
    Cancelled,
}

impl TransactionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionState::Pending)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: TransactionState) -> bool {
        matches!(
            (self, next),
            (
                TransactionState::Pending,
                TransactionState::Success | TransactionState::Failed | TransactionState::Cancelled
            )
        )
    }
}

impl Default for TransactionState {
    fn default() -> Self {
        TransactionState::Pending
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Pending => "Pending",
            TransactionState::Success => "Success",
            TransactionState::Failed => "Failed",
            TransactionState::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Why a transaction ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The transport wrote nothing or returned an error
    TransmitFailed(String),
    /// The retry budget ran out; `attempts` transmissions went unanswered
    Timeout { attempts: u32 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TransmitFailed(reason) => write!(f, "transmit failed: {}", reason),
            FailureReason::Timeout { attempts } => write!(f, "timed out after {} attempts", attempts),
        }
    }
}
