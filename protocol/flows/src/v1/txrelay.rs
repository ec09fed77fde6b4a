use crate::flow_context::{FlowContext, RequestScope};
use crate::Flow;
use async_trait::async_trait;
use norn_mempool::errors::RuleError as MempoolRuleError;
use norn_p2p_lib::wire::message::MAX_INV_PER_TX_INV_MSG;
use norn_p2p_lib::{IncomingRoute, Message, Peer, ProtocolError, Router, DEFAULT_TIMEOUT};
use norn_consensus_core::tx::TransactionId;
use std::sync::Arc;

/// Consumes transaction inventory from the peer, downloads unknown
/// transactions and feeds them through mempool admission
pub struct RelayTransactionsFlow {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    peer: Arc<Peer>,
    invs_route: IncomingRoute,
    transactions_route: IncomingRoute,
}

impl RelayTransactionsFlow {
    pub fn new(
        ctx: Arc<FlowContext>,
        router: Arc<Router>,
        peer: Arc<Peer>,
        invs_route: IncomingRoute,
        transactions_route: IncomingRoute,
    ) -> Self {
        Self { ctx, router, peer, invs_route, transactions_route }
    }

    async fn receive_requested(&mut self, requested: Vec<RequestScope>) -> Result<(), ProtocolError> {
        let consensus = self.ctx.consensus();
        for request in requested {
            let message = self.transactions_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await?;
            match message {
                Message::Tx(tx) => {
                    if tx.id() != request.req {
                        return Err(ProtocolError::OtherOwned(format!(
                            "peer sent transaction {} while {} was requested",
                            tx.id(),
                            request.req
                        )));
                    }
                    match self.ctx.mempool.validate_and_insert_transaction(consensus.as_ref(), (*tx).clone(), true) {
                        Ok(accepted) => {
                            let ids: Vec<TransactionId> = accepted.iter().map(|descriptor| descriptor.id()).collect();
                            self.ctx.broadcast_transactions(ids, Some(self.router.key())).await;
                        }
                        Err(MempoolRuleError::RejectInvalid(err)) => {
                            // A consensus-rule violation indicates the peer relays garbage
                            return Err(ProtocolError::ConsensusViolation(format!(
                                "relayed transaction {} is invalid: {}",
                                request.req, err
                            )));
                        }
                        Err(err) => {
                            // Policy rejections (fees, standardness, duplicates) are not misbehavior
                            log::debug!("relayed transaction {} was not accepted: {}", request.req, err);
                        }
                    }
                }
                Message::TransactionNotFound(id) => {
                    if id != request.req {
                        return Err(ProtocolError::OtherOwned(format!(
                            "peer reported not-found for {} while {} was requested",
                            id, request.req
                        )));
                    }
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage { expected: "Tx or TransactionNotFound", got: other.command() })
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Flow for RelayTransactionsFlow {
    fn name(&self) -> &'static str {
        "RelayTransactions"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.invs_route.dequeue().await?;
            let ids = match message {
                Message::InvTransactions(ids) => ids,
                other => return Err(ProtocolError::UnexpectedMessage { expected: "InvTransactions", got: other.command() }),
            };
            if ids.len() > MAX_INV_PER_TX_INV_MSG {
                return Err(ProtocolError::OversizedHashList(ids.len()));
            }
            if self.ctx.is_ibd_running() || self.peer.properties().disable_relay_tx {
                continue;
            }

            // Filter already-known transactions and ones pending via other peers
            let mut requested = Vec::new();
            for id in ids {
                if self.ctx.mempool.has_transaction(id, true) {
                    continue;
                }
                if let Some(scope) = self.ctx.shared_requested_transactions.add_if_not_exists(id) {
                    requested.push(scope);
                }
            }
            if requested.is_empty() {
                continue;
            }

            self.router.enqueue(Message::RequestTransactions(requested.iter().map(|scope| scope.req).collect())).await?;
            self.receive_requested(requested).await?;
        }
    }
}

/// Serves the peer's transaction download requests from the mempool
pub struct HandleRequestedTransactionsFlow {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleRequestedTransactionsFlow {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleRequestedTransactionsFlow {
    fn name(&self) -> &'static str {
        "HandleRequestedTransactions"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestTransactions(ids) => {
                    let descriptors = self.ctx.mempool.get_all_transactions();
                    for id in ids {
                        match descriptors.iter().find(|descriptor| descriptor.id() == id) {
                            Some(descriptor) => self.router.enqueue(Message::Tx(descriptor.transaction.clone())).await?,
                            None => self.router.enqueue(Message::TransactionNotFound(id)).await?,
                        }
                    }
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestTransactions", got: other.command() }),
            }
        }
    }
}
