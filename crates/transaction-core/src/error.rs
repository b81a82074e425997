use std::net::SocketAddr;

use thiserror::Error;

use crate::transaction::TransactionState;

/// A type alias for handling `Result`s with [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by transactions.
///
/// `TransmitFailed`, `Timeout` and `Cancelled` describe how a transaction
/// ended. `Disposed`, `AlreadyInitiated` and `InvalidState` are faults in how
/// the caller drives it.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport wrote nothing or reported an error
    #[error("Transmit to {destination} failed: {reason}")]
    TransmitFailed {
        destination: SocketAddr,
        reason: String,
    },

    /// No correlated response arrived before the retry budget ran out
    #[error("No response from {peer} after {attempts} attempts")]
    Timeout { peer: SocketAddr, attempts: u32 },

    /// The transaction was cancelled by its owner
    #[error("Transaction cancelled")]
    Cancelled,

    /// The transaction was used after `dispose()`
    #[error("Transaction used after dispose")]
    Disposed,

    /// `initiate()` was called more than once
    #[error("Transaction already initiated")]
    AlreadyInitiated,

    /// The operation is not valid in the current state
    #[error("Cannot {operation} a transaction in state {state}")]
    InvalidState {
        operation: &'static str,
        state: TransactionState,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error from the underlying transport
    #[error("Transport error: {0}")]
    Transport(#[from] pktx_transport::Error),
}

impl Error {
    /// True for the errors that report a terminal outcome rather than misuse
    pub fn is_terminal_outcome(&self) -> bool {
        matches!(
            self,
            Error::TransmitFailed { .. } | Error::Timeout { .. } | Error::Cancelled
        )
    }

    /// True when the caller used the transaction incorrectly
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Error::Disposed | Error::AlreadyInitiated | Error::InvalidState { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert!(Error::Timeout { peer, attempts: 2 }.is_terminal_outcome());
        assert!(Error::Cancelled.is_terminal_outcome());
        assert!(!Error::Disposed.is_terminal_outcome());

        assert!(Error::Disposed.is_programming_error());
        assert!(Error::AlreadyInitiated.is_programming_error());
        assert!(!Error::Config("x".into()).is_programming_error());
    }

    #[test]
    fn test_display() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(
            Error::Timeout { peer, attempts: 2 }.to_string(),
            "No response from 127.0.0.1:5000 after 2 attempts"
        );
        assert_eq!(
            Error::InvalidState {
                operation: "cancel",
                state: TransactionState::Success
            }
            .to_string(),
            "Cannot cancel a transaction in state Success"
        );
    }
}
