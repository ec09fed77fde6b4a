//!
//! Loopback tests driving two routers over a real socket pair
//!

use norn_p2p_lib::{Message, MessageCommand, ProtocolError, Router};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, _) = listener.accept().await.unwrap();
    (client, server)
}

#[tokio::test]
async fn test_message_roundtrip_over_socket() {
    let (client, server) = socket_pair().await;
    let outbound = Router::new(client, true);
    let inbound = Router::new(server, false);

    let ping_route = inbound.subscribe(&[MessageCommand::Ping]);
    let pong_route = outbound.subscribe(&[MessageCommand::Pong]);
    outbound.start();
    inbound.start();

    outbound.enqueue(Message::Ping { nonce: 7 }).await.unwrap();
    match ping_route.dequeue_with_timeout(Duration::from_secs(5)).await.unwrap() {
        Message::Ping { nonce } => assert_eq!(nonce, 7),
        other => panic!("unexpected message {:?}", other.command()),
    }

    inbound.enqueue(Message::Pong { nonce: 7 }).await.unwrap();
    match pong_route.dequeue_with_timeout(Duration::from_secs(5)).await.unwrap() {
        Message::Pong { nonce } => assert_eq!(nonce, 7),
        other => panic!("unexpected message {:?}", other.command()),
    }

    outbound.close();
    // A closed connection resolves pending dequeues as a clean termination
    assert!(matches!(pong_route.dequeue().await, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn test_unsubscribed_command_closes_connection() {
    let (client, server) = socket_pair().await;
    let outbound = Router::new(client, true);
    let inbound = Router::new(server, false);

    // The inbound side subscribes to pings only; a verack is unroutable
    let ping_route = inbound.subscribe(&[MessageCommand::Ping]);
    outbound.start();
    inbound.start();

    outbound.enqueue(Message::VerAck).await.unwrap();
    assert!(matches!(ping_route.dequeue().await, Err(ProtocolError::ConnectionClosed)));
    inbound.closed().await;
}

#[tokio::test]
async fn test_dequeue_timeout() {
    let (client, server) = socket_pair().await;
    let outbound = Router::new(client, true);
    let inbound = Router::new(server, false);
    let ping_route = inbound.subscribe(&[MessageCommand::Ping]);
    outbound.start();
    inbound.start();

    let result = ping_route.dequeue_with_timeout(Duration::from_millis(50)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout(_))));
}
