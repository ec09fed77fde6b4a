use crate::flow_context::FlowContext;
use crate::v1::ibd::IBD_BATCH_SIZE;
use crate::Flow;
use async_trait::async_trait;
use norn_p2p_lib::wire::message::MAX_UTXOS_PER_CHUNK;
use norn_p2p_lib::{IncomingRoute, Message, ProtocolError, Router, DEFAULT_TIMEOUT};
use std::sync::Arc;

/// Maximum number of locator hashes served per request
const LOCATOR_HASH_LIMIT: usize = 64;

/// Streams requested IBD block ranges to a syncing peer, pausing after each
/// batch until the peer requests the next one
pub struct HandleIbdBlockRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleIbdBlockRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleIbdBlockRequests {
    fn name(&self) -> &'static str {
        "HandleIbdBlockRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestIBDBlocks { low, high } => {
                    let consensus = self.ctx.consensus();
                    let hashes = consensus
                        .get_hashes_between(low, high, usize::MAX)
                        .map_err(|err| ProtocolError::OtherOwned(format!("cannot serve IBD range ({low}, {high}): {err}")))?;
                    log::debug!("serving {} IBD blocks to peer {}", hashes.len(), self.router.net_address());

                    for (index, hash) in hashes.iter().enumerate() {
                        // Pace the stream: wait for the peer's continuation
                        // request between batches
                        if index > 0 && index % IBD_BATCH_SIZE == 0 {
                            match self.requests_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
                                Message::RequestNextIBDBlocks => {}
                                other => {
                                    return Err(ProtocolError::UnexpectedMessage {
                                        expected: "RequestNextIBDBlocks",
                                        got: other.command(),
                                    })
                                }
                            }
                        }
                        let block = consensus
                            .get_block(*hash)
                            .map_err(|err| ProtocolError::OtherOwned(format!("missing body for served block {hash}: {err}")))?;
                        self.router.enqueue(Message::IBDBlock(block)).await?;
                    }
                    self.router.enqueue(Message::DoneIBDBlocks).await?;
                }
                // A stray continuation request after the stream completed is harmless
                Message::RequestNextIBDBlocks => {}
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestIBDBlocks", got: other.command() }),
            }
        }
    }
}

/// Serves block locator requests over the local selected chain
pub struct HandleBlockLocatorRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleBlockLocatorRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleBlockLocatorRequests {
    fn name(&self) -> &'static str {
        "HandleBlockLocatorRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestBlockLocator { low: _, high } => {
                    let consensus = self.ctx.consensus();
                    // The locator is built over our own selected chain; when
                    // the requested high is unknown we anchor at our selected tip
                    let anchor = if consensus.block_exists(high) { high } else { consensus.get_virtual_selected_parent() };
                    let locator = consensus
                        .create_block_locator_from_pruning_point(anchor, LOCATOR_HASH_LIMIT)
                        .map_err(|err| ProtocolError::OtherOwned(format!("cannot build a locator for {anchor}: {err}")))?;
                    self.router.enqueue(Message::BlockLocator(locator)).await?;
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestBlockLocator", got: other.command() }),
            }
        }
    }
}

/// Serves pruning point sync requests: the anticone with metadata, and the
/// chunked pruning point UTXO set
pub struct HandlePruningPointRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandlePruningPointRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandlePruningPointRequests {
    fn name(&self) -> &'static str {
        "HandlePruningPointRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            let consensus = self.ctx.consensus();
            match message {
                Message::RequestPruningPointAndItsAnticone => {
                    let anticone = consensus
                        .get_pruning_point_anticone()
                        .map_err(|err| ProtocolError::OtherOwned(format!("cannot serve the pruning point anticone: {err}")))?;
                    for hash in anticone {
                        let block = consensus
                            .get_block(hash)
                            .map_err(|err| ProtocolError::OtherOwned(format!("missing anticone block {hash}: {err}")))?;
                        let info = consensus.get_block_info(hash);
                        let multiset = consensus.get_utxo_multiset(hash).unwrap_or_default();
                        self.router
                            .enqueue(Message::BlockWithMetaData {
                                block,
                                blue_score: info.blue_score.unwrap_or_default(),
                                blue_work: info.blue_work.unwrap_or_default(),
                                multiset: multiset.serialize(),
                            })
                            .await?;
                    }
                    self.router.enqueue(Message::DoneBlocksWithMetaData).await?;
                }
                Message::RequestPruningPointUTXOSet(pruning_point) => {
                    if pruning_point != consensus.get_pruning_point() {
                        self.router.enqueue(Message::UnexpectedPruningPoint).await?;
                        continue;
                    }
                    let mut from_outpoint = None;
                    loop {
                        let chunk = consensus.get_virtual_utxos(from_outpoint, MAX_UTXOS_PER_CHUNK as usize);
                        if chunk.is_empty() {
                            break;
                        }
                        from_outpoint = Some(chunk.last().unwrap().0);
                        let done = chunk.len() < MAX_UTXOS_PER_CHUNK as usize;
                        self.router.enqueue(Message::PruningPointUtxoSetChunk(chunk)).await?;
                        if done {
                            break;
                        }
                    }
                    self.router.enqueue(Message::DonePruningPointUtxoSetChunks).await?;
                }
                other => {
                    return Err(ProtocolError::UnexpectedMessage { expected: "RequestPruningPointAndItsAnticone", got: other.command() })
                }
            }
        }
    }
}

/// Answers blue work queries used by peers to decide whether to sync from us
pub struct HandleBlueWorkRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleBlueWorkRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleBlueWorkRequests {
    fn name(&self) -> &'static str {
        "HandleBlueWorkRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestBlockBlueWork(hash) => {
                    let consensus = self.ctx.consensus();
                    let info = consensus.get_block_info(hash);
                    let (Some(blue_score), Some(blue_work)) = (info.blue_score, info.blue_work) else {
                        return Err(ProtocolError::OtherOwned(format!("peer requested blue work of unknown block {hash}")));
                    };
                    self.router.enqueue(Message::BlockBlueWork { blue_score, blue_work }).await?;
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestBlockBlueWork", got: other.command() }),
            }
        }
    }
}

/// Announces our virtual selected parent on request
pub struct HandleSelectedTipRequests {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    requests_route: IncomingRoute,
}

impl HandleSelectedTipRequests {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, requests_route: IncomingRoute) -> Self {
        Self { ctx, router, requests_route }
    }
}

#[async_trait]
impl Flow for HandleSelectedTipRequests {
    fn name(&self) -> &'static str {
        "HandleSelectedTipRequests"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.requests_route.dequeue().await?;
            match message {
                Message::RequestSelectedTip => {
                    self.router.enqueue(Message::SelectedTip(self.ctx.consensus().get_virtual_selected_parent())).await?;
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "RequestSelectedTip", got: other.command() }),
            }
        }
    }
}
