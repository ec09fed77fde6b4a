use crate::flow_context::FlowContext;
use crate::Flow;
use async_trait::async_trait;
use norn_consensus_core::errors::block::RuleError;
use norn_p2p_lib::{IncomingRoute, Message, Peer, ProtocolError, Router, DEFAULT_TIMEOUT};
use norn_hashes::Hash;
use std::collections::VecDeque;
use std::sync::Arc;

/// The per-peer block relay state machine: consumes block invs, downloads
/// unknown blocks, inserts them and handles the orphan/IBD fallback paths
pub struct HandleRelayInvsFlow {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    peer: Arc<Peer>,
    invs_route: IncomingRoute,
    blocks_route: IncomingRoute,
    /// Invs fabricated locally for missing orphan parents, processed before
    /// the peer's own inv queue
    pending_invs: VecDeque<Hash>,
}

impl HandleRelayInvsFlow {
    pub fn new(
        ctx: Arc<FlowContext>,
        router: Arc<Router>,
        peer: Arc<Peer>,
        invs_route: IncomingRoute,
        blocks_route: IncomingRoute,
    ) -> Self {
        Self { ctx, router, peer, invs_route, blocks_route, pending_invs: VecDeque::new() }
    }

    async fn next_inv(&mut self) -> Result<Hash, ProtocolError> {
        if let Some(hash) = self.pending_invs.pop_front() {
            return Ok(hash);
        }
        match self.invs_route.dequeue().await? {
            Message::InvRelayBlock(hash) => Ok(hash),
            other => Err(ProtocolError::UnexpectedMessage { expected: "InvRelayBlock", got: other.command() }),
        }
    }

    async fn request_block(&mut self, requested_hash: Hash) -> Result<norn_consensus_core::block::Block, ProtocolError> {
        self.router.enqueue(Message::RequestRelayBlocks(vec![requested_hash])).await?;
        match self.blocks_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
            Message::Block(block) => {
                if block.hash() != requested_hash {
                    return Err(ProtocolError::UnrequestedBlock(block.hash()));
                }
                Ok(block)
            }
            other => Err(ProtocolError::UnexpectedMessage { expected: "Block", got: other.command() }),
        }
    }
}

#[async_trait]
impl Flow for HandleRelayInvsFlow {
    fn name(&self) -> &'static str {
        "HandleRelayInvs"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let inv = self.next_inv().await?;
            let consensus = self.ctx.consensus();

            let info = consensus.get_block_info(inv);
            if info.exists {
                if info.status.is_some_and(|status| status.is_invalid()) {
                    // A peer advertising a known-invalid block is misbehaving
                    return Err(ProtocolError::ConsensusViolation(format!("relayed inv of a known invalid block {inv}")));
                }
                continue;
            }
            if self.ctx.is_known_orphan(inv) {
                // Keep requesting its missing parents instead
                self.pending_invs.extend(self.ctx.orphan_missing_parents(consensus.as_ref(), inv));
                continue;
            }
            if self.ctx.is_ibd_running() {
                // Relay is suspended while syncing; the IBD catches us up
                continue;
            }
            // The scope ensures the shared entry is released on all exit paths
            let Some(_request_scope) = self.ctx.shared_requested_blocks.add_if_not_exists(inv) else {
                // Another peer flow is already downloading this block
                continue;
            };

            let block = self.request_block(inv).await?;
            if block.is_header_only() {
                return Err(ProtocolError::ConsensusViolation(format!("peer relayed a header-only block {inv}")));
            }

            match consensus.validate_and_insert_block(block.clone()) {
                Ok(_) => {
                    self.ctx.on_new_block(consensus.as_ref(), &block, Some(self.router.key())).await;
                }
                Err(RuleError::MissingParents(missing_parents)) => {
                    if self.ctx.is_block_in_orphan_resolution_range(consensus.as_ref(), &block) {
                        log::debug!("block {inv} is orphaned, requesting its {} missing parents", missing_parents.len());
                        self.ctx.add_orphan(block);
                        self.pending_invs.extend(missing_parents);
                    } else {
                        // Too far ahead of our DAG: switch to IBD towards this peer
                        self.ctx.trigger_ibd(self.peer.key(), self.peer.selected_tip());
                    }
                }
                Err(RuleError::DuplicateBlock) => {}
                Err(RuleError::TimeTooFarIntoTheFuture(block_time, max_time)) => {
                    // Clock skew is not misbehavior; the block will be relayed
                    // again once it matures into our accepted window
                    log::debug!("ignoring future block {inv} (timestamp {block_time}, local max {max_time})");
                }
                Err(err) => {
                    return Err(ProtocolError::ConsensusViolation(format!("relayed block {inv} is invalid: {err}")));
                }
            }
        }
    }
}

/// Serves the peer's block download requests from the local DAG
pub struct HandleRelayBlockRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleRelayBlockRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleRelayBlockRequests {
    fn name(&self) -> &'static str {
        "HandleRelayBlockRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestRelayBlocks(hashes) => {
                    let consensus = self.ctx.consensus();
                    for hash in hashes {
                        match consensus.get_block(hash) {
                            Ok(block) => self.router.enqueue(Message::Block(block)).await?,
                            Err(_) => {
                                return Err(ProtocolError::OtherOwned(format!("peer requested a block we do not have: {hash}")));
                            }
                        }
                    }
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestRelayBlocks", got: other.command() }),
            }
        }
    }
}
