use crate::Flow;
use async_trait::async_trait;
use norn_p2p_lib::{IncomingRoute, Message, ProtocolError, Router};
use std::sync::Arc;

/// Surfaces `Reject` notes from the peer; a reject ends the connection from
/// our side as well, without banning
pub struct HandleRejectsFlow {
    router: Arc<Router>,
    rejects_route: IncomingRoute,
}

impl HandleRejectsFlow {
    pub fn new(router: Arc<Router>, rejects_route: IncomingRoute) -> Self {
        Self { router, rejects_route }
    }
}

#[async_trait]
impl Flow for HandleRejectsFlow {
    fn name(&self) -> &'static str {
        "HandleRejects"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        let message = self.rejects_route.dequeue().await?;
        match message {
            Message::Reject { reason } => {
                log::info!("P2P, peer {} rejected us: {}", self.router.net_address(), reason);
                Err(ProtocolError::PeerRejected(reason))
            }
            other => Err(ProtocolError::UnexpectedMessage { expected: "Reject", got: other.command() }),
        }
    }
}
