use crate::flow_context::FlowContext;
use crate::Flow;
use async_trait::async_trait;
use norn_p2p_lib::wire::message::MAX_ADDRESSES_PER_MSG;
use norn_p2p_lib::{IncomingRoute, Message, ProtocolError, Router};
use std::collections::HashSet;
use std::sync::Arc;

/// Merges address gossip from the peer into the address manager
pub struct ReceiveAddressesFlow {
    ctx: Arc<FlowContext>,
    _router: Arc<Router>,
    addresses_route: IncomingRoute,
}

impl ReceiveAddressesFlow {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, addresses_route: IncomingRoute) -> Self {
        Self { ctx, _router: router, addresses_route }
    }
}

#[async_trait]
impl Flow for ReceiveAddressesFlow {
    fn name(&self) -> &'static str {
        "ReceiveAddresses"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.addresses_route.dequeue().await?;
            match message {
                Message::Addresses(addresses) => {
                    let mut amgr = self.ctx.address_manager.lock();
                    for address in addresses {
                        amgr.add_address(address);
                    }
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "Addresses", got: other.command() }),
            }
        }
    }
}

/// Serves `RequestAddresses` with a bounded sample of the known address book
pub struct SendAddressesFlow {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl SendAddressesFlow {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for SendAddressesFlow {
    fn name(&self) -> &'static str {
        "SendAddresses"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestAddresses => {
                    let addresses = self
                        .ctx
                        .address_manager
                        .lock()
                        .iterate_prioritized_random_addresses(HashSet::new(), MAX_ADDRESSES_PER_MSG as usize);
                    self.router.enqueue(Message::Addresses(addresses)).await?;
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestAddresses", got: other.command() }),
            }
        }
    }
}
