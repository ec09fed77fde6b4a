use crate::Flow;
use async_trait::async_trait;
use norn_p2p_lib::{IncomingRoute, Message, ProtocolError, Router, DEFAULT_TIMEOUT};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const PING_INTERVAL: Duration = Duration::from_secs(120);

/// Periodically pings the peer and expects a matching pong within the default timeout
pub struct SendPingsFlow {
    router: Arc<Router>,
    pong_route: IncomingRoute,
}

impl SendPingsFlow {
    pub fn new(router: Arc<Router>, pong_route: IncomingRoute) -> Self {
        Self { router, pong_route }
    }
}

#[async_trait]
impl Flow for SendPingsFlow {
    fn name(&self) -> &'static str {
        "SendPings"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        let mut ticker = tokio::time::interval(PING_INTERVAL);
        // The first tick fires immediately; skip it so a fresh connection is not pinged at once
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if self.router.is_closed() {
                return Ok(());
            }
            let nonce: u64 = rand::thread_rng().r#gen();
            self.router.enqueue(Message::Ping { nonce }).await?;
            match self.pong_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
                Message::Pong { nonce: response_nonce } if response_nonce == nonce => {}
                Message::Pong { .. } => {
                    return Err(ProtocolError::Other("pong nonce does not match the sent ping"));
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "Pong", got: other.command() }),
            }
        }
    }
}

/// Answers the peer's pings
pub struct ReceivePingsFlow {
    router: Arc<Router>,
    ping_route: IncomingRoute,
}

impl ReceivePingsFlow {
    pub fn new(router: Arc<Router>, ping_route: IncomingRoute) -> Self {
        Self { router, ping_route }
    }
}

#[async_trait]
impl Flow for ReceivePingsFlow {
    fn name(&self) -> &'static str {
        "ReceivePings"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.ping_route.dequeue().await?;
            match message {
                Message::Ping { nonce } => self.router.enqueue(Message::Pong { nonce }).await?,
                other => return Err(ProtocolError::UnexpectedMessage { expected: "Ping", got: other.command() }),
            }
        }
    }
}
