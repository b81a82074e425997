//! Response correlation.
//!
//! A delivery answers a transaction only if it arrived on the transaction's
//! own socket from the transaction's destination. Protocols that embed a
//! correlation token in their payload add a [`ResponseMatcher`]; it is
//! consulted after the address checks pass and can only narrow the match.

use std::fmt;
use std::net::SocketAddr;

use pktx_transport::{Packet, ReceivedPacket};
use tracing::warn;

/// Payload-level correlation hook.
pub trait ResponseMatcher<P>: Send + Sync {
    /// Whether `candidate` answers `request`. Only called for packets that
    /// already passed the address checks.
    fn matches(&self, request: &P, candidate: &P) -> bool;
}

impl<P, F> ResponseMatcher<P> for F
where
    F: Fn(&P, &P) -> bool + Send + Sync,
{
    fn matches(&self, request: &P, candidate: &P) -> bool {
        self(request, candidate)
    }
}

/// Address matching only; accepts any payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressOnly;

impl<P> ResponseMatcher<P> for AddressOnly {
    fn matches(&self, _request: &P, _candidate: &P) -> bool {
        true
    }
}

/// Result of checking one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// The delivery answers the transaction
    Matched,
    /// The transport attached no routing metadata, or no local address
    MissingRouting,
    /// Arrived on another socket or from another peer
    AddressMismatch,
    /// Addresses match but the payload matcher rejected it
    PayloadMismatch,
}

impl Correlation {
    pub fn is_match(self) -> bool {
        self == Correlation::Matched
    }
}

/// The correlation predicate for one transaction.
pub struct Correlator<P> {
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    matcher: Box<dyn ResponseMatcher<P>>,
}

impl<P: Packet> Correlator<P> {
    pub fn new(
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        matcher: Box<dyn ResponseMatcher<P>>,
    ) -> Self {
        Self {
            local_addr,
            peer_addr,
            matcher,
        }
    }

    /// Address-only correlation
    pub fn by_address(local_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Self::new(local_addr, peer_addr, Box::new(AddressOnly))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Decides whether `received` answers `request`.
    ///
    /// Both address checks are mandatory. Missing routing metadata is a
    /// transport contract violation; it is logged and treated as a mismatch.
    pub fn check_response(&self, request: &P, received: &ReceivedPacket<P>) -> Correlation {
        let Some(info) = received.info else {
            warn!(peer = %self.peer_addr, "Packet delivered without routing info");
            return Correlation::MissingRouting;
        };

        let Some(local_addr) = info.local_addr else {
            warn!(peer = %info.peer_addr, "Packet delivered without local address");
            return Correlation::MissingRouting;
        };

        if local_addr != self.local_addr || info.peer_addr != self.peer_addr {
            return Correlation::AddressMismatch;
        }

        if !self.matcher.matches(request, &received.packet) {
            return Correlation::PayloadMismatch;
        }

        Correlation::Matched
    }
}

impl<P> fmt::Debug for Correlator<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pktx_transport::{PacketInfo, RawPacket};

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    const LOCAL: &str = "127.0.0.1:4000";
    const PEER: &str = "127.0.0.1:5000";

    fn delivery(info: Option<PacketInfo>) -> ReceivedPacket<RawPacket> {
        ReceivedPacket {
            packet: RawPacket::from("reply"),
            info,
        }
    }

    #[test]
    fn test_address_match() {
        let correlator = Correlator::by_address(addr(LOCAL), addr(PEER));
        let request = RawPacket::from("req");

        let ok = delivery(Some(PacketInfo::new(addr(LOCAL), addr(PEER))));
        assert_eq!(correlator.check_response(&request, &ok), Correlation::Matched);

        let wrong_peer = delivery(Some(PacketInfo::new(addr(LOCAL), addr("127.0.0.1:5001"))));
        assert_eq!(correlator.check_response(&request, &wrong_peer), Correlation::AddressMismatch);

        let wrong_socket = delivery(Some(PacketInfo::new(addr("127.0.0.1:4001"), addr(PEER))));
        assert_eq!(correlator.check_response(&request, &wrong_socket), Correlation::AddressMismatch);
    }

    #[test]
    fn test_missing_routing_is_not_a_match() {
        let correlator = Correlator::by_address(addr(LOCAL), addr(PEER));
        let request = RawPacket::from("req");

        assert_eq!(correlator.check_response(&request, &delivery(None)), Correlation::MissingRouting);

        let no_local = delivery(Some(PacketInfo::from_peer(addr(PEER))));
        assert_eq!(correlator.check_response(&request, &no_local), Correlation::MissingRouting);
    }

    #[test]
    fn test_payload_matcher_narrows_address_match() {
        let correlator: Correlator<RawPacket> = Correlator::new(
            addr(LOCAL),
            addr(PEER),
            Box::new(|request: &RawPacket, candidate: &RawPacket| {
                candidate.as_bytes().starts_with(&request.as_bytes()[..2])
            }),
        );
        let request = RawPacket::from("re-1");

        let good = ReceivedPacket::new(RawPacket::from("re:ok"), PacketInfo::new(addr(LOCAL), addr(PEER)));
        assert!(correlator.check_response(&request, &good).is_match());

        let bad = ReceivedPacket::new(RawPacket::from("xx:ok"), PacketInfo::new(addr(LOCAL), addr(PEER)));
        assert_eq!(correlator.check_response(&request, &bad), Correlation::PayloadMismatch);

        // The matcher never rescues an address mismatch
        let stray = ReceivedPacket::new(RawPacket::from("re:ok"), PacketInfo::new(addr(LOCAL), addr("10.0.0.9:5000")));
        assert_eq!(correlator.check_response(&request, &stray), Correlation::AddressMismatch);
    }
}
