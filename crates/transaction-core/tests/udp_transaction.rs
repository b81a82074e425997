//! End-to-end transactions over real UDP sockets on loopback.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pktx_transaction_core::{Error, TransactionBuilder, TransactionState};
use pktx_transport::{PacketSocket, RawPacket, bind_udp};
use tokio::net::UdpSocket;

/// Spawns a peer that answers every datagram with `ack:` + payload.
/// The first `drop_first` datagrams go unanswered.
async fn spawn_echo_peer(drop_first: usize) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = [0u8; 1500];
        let mut seen = 0;
        while let Ok((len, from)) = socket.recv_from(&mut buf).await {
            seen += 1;
            if seen <= drop_first {
                continue;
            }
            let mut reply = b"ack:".to_vec();
            reply.extend_from_slice(&buf[..len]);
            let _ = socket.send_to(&reply, from).await;
        }
    });

    addr
}

async fn bound_socket() -> (
    Arc<PacketSocket<RawPacket>>,
    tokio::sync::mpsc::Receiver<pktx_transport::ReceivedPacket<RawPacket>>,
) {
    let (transport, events) = bind_udp("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let socket = Arc::new(PacketSocket::new(Arc::new(transport)));
    let (_handle, unclaimed) = socket.spawn_dispatch_loop(events);
    (socket, unclaimed)
}

#[tokio::test]
async fn test_udp_request_response() {
    let peer = spawn_echo_peer(0).await;
    let (socket, _unclaimed) = bound_socket().await;

    let transaction = TransactionBuilder::new(socket.clone(), peer, RawPacket::from("hello"))
        .timeout(Duration::from_millis(500))
        .retries(2)
        .build()
        .unwrap();

    transaction.initiate().await.unwrap();
    let response = tokio::time::timeout(Duration::from_secs(5), transaction.outcome())
        .await
        .expect("transaction did not settle")
        .unwrap();

    assert_eq!(response, RawPacket::from("ack:hello"));
    assert_eq!(transaction.state(), TransactionState::Success);
    assert_eq!(transaction.retry_count(), 0);
    transaction.dispose().unwrap();
    assert_eq!(socket.listener_count(), 0);
}

#[tokio::test]
async fn test_udp_retransmission_recovers_lost_request() {
    let peer = spawn_echo_peer(1).await;
    let (socket, _unclaimed) = bound_socket().await;

    let transaction = TransactionBuilder::new(socket, peer, RawPacket::from("again"))
        .timeout(Duration::from_millis(50))
        .retries(3)
        .build()
        .unwrap();

    transaction.initiate().await.unwrap();
    let response = tokio::time::timeout(Duration::from_secs(5), transaction.outcome())
        .await
        .expect("transaction did not settle")
        .unwrap();

    assert_eq!(response, RawPacket::from("ack:again"));
    assert!(transaction.retry_count() >= 1);
}

#[tokio::test]
async fn test_udp_silent_peer_times_out() {
    // Bound but never read, so nothing answers
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let (socket, _unclaimed) = bound_socket().await;

    let transaction = TransactionBuilder::new(socket, silent.local_addr().unwrap(), RawPacket::from("anyone?"))
        .timeout(Duration::from_millis(20))
        .retries(1)
        .build()
        .unwrap();

    transaction.initiate().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), transaction.outcome())
        .await
        .expect("transaction did not settle");

    assert!(matches!(result, Err(Error::Timeout { attempts: 2, .. })), "got {:?}", result);
}

#[tokio::test]
async fn test_udp_unsolicited_packet_is_not_claimed() {
    let peer = spawn_echo_peer(0).await;
    let (socket, mut unclaimed) = bound_socket().await;
    let local = socket.local_addr().unwrap();

    let transaction = TransactionBuilder::new(socket, peer, RawPacket::from("ping"))
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    transaction.initiate().await.unwrap();

    let stranger = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    stranger.send_to(b"unrelated", local).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let received = unclaimed.recv().await.expect("dispatch loop ended");
            if received.packet == RawPacket::from("unrelated") {
                break received;
            }
        }
    })
    .await
    .expect("unsolicited packet not forwarded");

    assert_eq!(received.peer_addr(), Some(stranger.local_addr().unwrap()));
    let response = transaction.outcome().await.unwrap();
    assert_eq!(response, RawPacket::from("ack:ping"));
}
