//! Builder for transactions
//!
//! Collects the destination, request and timing settings for one
//! [`Transaction`] and registers it on the socket in [`TransactionBuilder::build`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pktx_transport::{Packet, PacketSocket};

use crate::config::TransactionConfig;
use crate::error::Result;
use crate::transaction::{AddressOnly, ResponseMatcher, Transaction};

/// Fluent construction of a [`Transaction`].
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # use pktx_transport::{MemoryTransport, PacketSocket, RawPacket};
/// # use pktx_transaction_core::TransactionBuilder;
/// # fn example() -> pktx_transaction_core::Result<()> {
/// let transport = Arc::new(MemoryTransport::new("127.0.0.1:4000".parse().unwrap()));
/// let socket = Arc::new(PacketSocket::<RawPacket>::new(transport));
///
/// let transaction = TransactionBuilder::new(socket, "127.0.0.1:5000".parse().unwrap(), RawPacket::from("ping"))
///     .timeout(Duration::from_millis(200))
///     .retries(2)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct TransactionBuilder<P: Packet> {
    socket: Arc<PacketSocket<P>>,
    peer_addr: SocketAddr,
    request: P,
    config: TransactionConfig,
    matcher: Box<dyn ResponseMatcher<P>>,
}

impl<P: Packet> TransactionBuilder<P> {
    pub fn new(socket: Arc<PacketSocket<P>>, peer_addr: SocketAddr, request: P) -> Self {
        Self {
            socket,
            peer_addr,
            request,
            config: TransactionConfig::default(),
            matcher: Box::new(AddressOnly),
        }
    }

    /// Replaces every timing setting at once
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Listener priority on the shared socket
    pub fn priority(mut self, priority: i32) -> Self {
        self.config.listener_priority = priority;
        self
    }

    /// Narrows correlation with a payload check, e.g. a protocol's
    /// transaction token
    pub fn matcher<M>(mut self, matcher: M) -> Self
    where
        M: ResponseMatcher<P> + 'static,
    {
        self.matcher = Box::new(matcher);
        self
    }

    /// Validates the settings and registers the transaction on its socket
    pub fn build(self) -> Result<Transaction<P>> {
        Transaction::with_matcher(self.socket, self.peer_addr, self.request, self.config, self.matcher)
    }
}
