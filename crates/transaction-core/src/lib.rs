//! # Transaction Core for the pktx stack
//!
//! Bounded request/response exchanges over a shared, connectionless
//! [`PacketSocket`](pktx_transport::PacketSocket).
//!
//! A [`Transaction`] sends one request to one peer and waits for the
//! correlated response, retransmitting the unchanged request when a timeout
//! elapses while its retry budget lasts. Responses are recognised by the
//! socket they arrived on and the peer they came from, optionally narrowed by
//! a payload [`ResponseMatcher`]. A recognised response is claimed so no
//! other listener on the socket sees it.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pktx_transport::{PacketSocket, RawPacket, bind_udp};
//! use pktx_transaction_core::{Error, Transaction, TransactionConfig};
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let (transport, events) = bind_udp("127.0.0.1:0".parse()?).await?;
//! let socket = Arc::new(PacketSocket::<RawPacket>::new(Arc::new(transport)));
//! let (_dispatch, _unclaimed) = socket.spawn_dispatch_loop(events);
//!
//! let config = TransactionConfig::default().with_timeout(Duration::from_millis(500));
//! let transaction = Transaction::new(socket, "127.0.0.1:7000".parse()?, RawPacket::from("ping"), config)?;
//! transaction.initiate().await?;
//!
//! match transaction.outcome().await {
//!     Ok(response) => println!("got {:?}", response),
//!     Err(Error::Timeout { attempts, .. }) => println!("no answer after {} attempts", attempts),
//!     Err(e) => println!("failed: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod builders;
pub mod config;
pub mod error;
pub mod transaction;

// Re-export commonly used types
pub use builders::TransactionBuilder;
pub use config::TransactionConfig;
pub use error::{Error, Result};
pub use transaction::{
    AddressOnly, CompletionNotifier, Correlation, Correlator, FailureReason, ResponseMatcher, RetryPolicy,
    RetryTimer, Transaction, TransactionId, TransactionState,
};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        AddressOnly, Error, FailureReason, ResponseMatcher, Result, Transaction, TransactionBuilder,
        TransactionConfig, TransactionId, TransactionState,
    };
}
