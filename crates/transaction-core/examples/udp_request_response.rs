/**
 * UDP Request/Response Example
 *
 * Two packet sockets on loopback:
 *
 * 1. The server socket has no transactions; every datagram it receives is
 *    unclaimed and answered from the unclaimed channel
 * 2. The client runs a transaction per request and waits for its outcome
 * 3. The first request to the server is dropped on purpose so the client's
 *    retransmission path is exercised
 *
 * To run this example with full logging:
 * ```
 * RUST_LOG=pktx=trace cargo run --example udp_request_response
 * ```
 */

use std::sync::Arc;
use std::time::Duration;

use pktx_infra_common::{LoggingConfig, log_welcome, setup_logging};
use pktx_transaction_core::{Error, TransactionBuilder};
use pktx_transport::{PacketSocket, RawPacket, bind_udp};
use tracing::{Level, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging = LoggingConfig::new(Level::DEBUG, "pktx-example");
    setup_logging(logging.clone())?;
    log_welcome(&logging, env!("CARGO_PKG_VERSION"));

    // ------------- Server setup -----------------

    let (server_transport, server_events) = bind_udp("127.0.0.1:0".parse()?).await?;
    let server = Arc::new(PacketSocket::<RawPacket>::new(Arc::new(server_transport)));
    let server_addr = server.local_addr()?;
    let (_server_loop, mut requests) = server.spawn_dispatch_loop(server_events);
    info!("Server listening on {}", server_addr);

    let responder = server.clone();
    tokio::spawn(async move {
        let mut dropped_first = false;
        while let Some(request) = requests.recv().await {
            let Some(from) = request.peer_addr() else { continue };
            if !dropped_first {
                dropped_first = true;
                warn!("Server dropping first request from {}", from);
                continue;
            }
            let mut body = b"pong:".to_vec();
            body.extend_from_slice(request.packet.as_bytes());
            if let Err(e) = responder.send_packet(&RawPacket::from(body), from).await {
                warn!("Server failed to answer {}: {}", from, e);
            }
        }
    });

    // ------------- Client setup -----------------

    let (client_transport, client_events) = bind_udp("127.0.0.1:0".parse()?).await?;
    let client = Arc::new(PacketSocket::<RawPacket>::new(Arc::new(client_transport)));
    let (_client_loop, _unclaimed) = client.spawn_dispatch_loop(client_events);
    info!("Client bound to {}", client.local_addr()?);

    for body in ["first", "second"] {
        let transaction = TransactionBuilder::new(client.clone(), server_addr, RawPacket::from(body))
            .timeout(Duration::from_millis(200))
            .retries(2)
            .build()?;

        transaction.on_response(|response| info!("Response callback: {:?}", response))?;
        transaction.initiate().await?;

        match transaction.outcome().await {
            Ok(response) => info!(
                "Transaction {} succeeded after {} retransmissions: {}",
                transaction.id(),
                transaction.retry_count(),
                String::from_utf8_lossy(response.as_bytes())
            ),
            Err(Error::Timeout { attempts, .. }) => warn!("No response after {} attempts", attempts),
            Err(e) => warn!("Transaction failed: {}", e),
        }

        transaction.dispose()?;
    }

    Ok(())
}
