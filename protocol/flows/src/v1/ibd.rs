use crate::flow_context::FlowContext;
use crate::Flow;
use async_trait::async_trait;
use norn_consensus_core::api::DynConsensus;
use norn_consensus_core::errors::pruning::PruningImportError;
use norn_hashes::Hash;
use norn_multiset::Multiset;
use norn_p2p_lib::{IncomingRoute, Message, Peer, ProtocolError, Router, DEFAULT_TIMEOUT};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// After this many streamed blocks the syncing side explicitly requests the
/// next batch, bounding the sender's queue growth
pub const IBD_BATCH_SIZE: usize = 99;

/// The client-side routes an IBD consumes
pub struct IbdClientRoutes {
    pub locator_route: IncomingRoute,
    pub blocks_route: IncomingRoute,
    pub metadata_route: IncomingRoute,
    pub chunks_route: IncomingRoute,
    pub blue_work_route: IncomingRoute,
}

/// Runs IBD against this peer when triggered. Only one IBD runs process-wide;
/// triggers arriving while another sync is running are dropped.
pub struct IbdFlow {
    ctx: Arc<FlowContext>,
    router: Arc<Router>,
    peer: Arc<Peer>,
    routes: IbdClientRoutes,
    trigger_receiver: UnboundedReceiver<Hash>,
}

impl IbdFlow {
    pub fn new(
        ctx: Arc<FlowContext>,
        router: Arc<Router>,
        peer: Arc<Peer>,
        routes: IbdClientRoutes,
        trigger_receiver: UnboundedReceiver<Hash>,
    ) -> Self {
        Self { ctx, router, peer, routes, trigger_receiver }
    }

    async fn ibd(&mut self, peer_selected_tip: Hash) -> Result<(), ProtocolError> {
        // Only a single IBD may run at any time
        let Some(_guard) = self.ctx.try_start_ibd() else {
            log::debug!("IBD is already running, ignoring the trigger towards {}", peer_selected_tip);
            return Ok(());
        };
        log::info!("IBD started towards {} (peer {})", peer_selected_tip, self.peer);

        let consensus = self.ctx.consensus();

        // The peer must prove more accumulated blue work before we sync to it
        self.router.enqueue(Message::RequestBlockBlueWork(peer_selected_tip)).await?;
        let (peer_blue_score, peer_blue_work) = match self.routes.blue_work_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
            Message::BlockBlueWork { blue_score, blue_work } => (blue_score, blue_work),
            other => return Err(ProtocolError::UnexpectedMessage { expected: "BlockBlueWork", got: other.command() }),
        };
        let local_selected_parent = consensus.get_virtual_selected_parent();
        let local_blue_work = consensus.get_blue_work(local_selected_parent).unwrap_or_default();
        if peer_blue_work <= local_blue_work {
            log::info!("IBD aborted: peer's advertised tip has no more blue work than ours");
            return Ok(());
        }

        let local_blue_score = consensus.get_virtual_blue_score();
        if peer_blue_score > local_blue_score + self.ctx.config.params.pruning_depth {
            // The gap exceeds the pruning depth: sync a pruning point UTXO set
            // into a sandboxed staging consensus first
            self.pruning_point_sync(peer_selected_tip).await
        } else {
            self.headers_first_sync(&consensus, peer_selected_tip).await
        }
    }

    /// Catch-up sync: negotiate the highest shared chain block through the
    /// peer's locator, then stream the missing blocks in topological order
    async fn headers_first_sync(&mut self, consensus: &DynConsensus, peer_selected_tip: Hash) -> Result<(), ProtocolError> {
        let genesis = consensus.get_pruning_point();
        self.router.enqueue(Message::RequestBlockLocator { low: genesis, high: peer_selected_tip }).await?;
        let locator = match self.routes.locator_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
            Message::BlockLocator(hashes) => hashes,
            other => return Err(ProtocolError::UnexpectedMessage { expected: "BlockLocator", got: other.command() }),
        };
        if locator.is_empty() {
            return Err(ProtocolError::ConsensusViolation("peer sent an empty block locator".to_string()));
        }
        let highest_shared = consensus
            .find_highest_shared_block(&locator)
            .map_err(|_| ProtocolError::ConsensusViolation("peer locator shares no block with our DAG".to_string()))?;
        log::debug!("IBD, highest shared block with {} is {}", self.peer, highest_shared);

        self.sync_missing_blocks(consensus, highest_shared, peer_selected_tip).await
    }

    async fn sync_missing_blocks(
        &mut self,
        consensus: &DynConsensus,
        highest_shared: Hash,
        peer_selected_tip: Hash,
    ) -> Result<(), ProtocolError> {
        self.router.enqueue(Message::RequestIBDBlocks { low: highest_shared, high: peer_selected_tip }).await?;
        let mut received: usize = 0;
        loop {
            let message = self.routes.blocks_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await?;
            match message {
                Message::IBDBlock(block) => {
                    let hash = block.hash();
                    match consensus.validate_and_insert_block(block) {
                        Ok(_) => {}
                        // Duplicates may arrive around the highest shared block
                        Err(norn_consensus_core::errors::block::RuleError::DuplicateBlock) => {}
                        Err(err) => {
                            // Topological streaming means any orphan/invalid outcome is the peer's fault
                            return Err(ProtocolError::ConsensusViolation(format!("IBD block {hash} was rejected: {err}")));
                        }
                    }
                    received += 1;
                    if received % IBD_BATCH_SIZE == 0 {
                        self.router.enqueue(Message::RequestNextIBDBlocks).await?;
                    }
                }
                Message::DoneIBDBlocks => break,
                other => return Err(ProtocolError::UnexpectedMessage { expected: "IBDBlock", got: other.command() }),
            }
        }
        log::info!("IBD finished streaming {} blocks from {}", received, self.peer);
        Ok(())
    }

    /// Deep sync: download the peer's pruning point, its anticone and the
    /// pruning point UTXO set into a staging consensus, then continue a normal
    /// block sync over it. The staging consensus is committed only on full
    /// success and deleted on every failure path.
    async fn pruning_point_sync(&mut self, peer_selected_tip: Hash) -> Result<(), ProtocolError> {
        let staging = self.ctx.consensus_manager.begin_staging_consensus();
        match self.pruning_point_sync_inner(&staging, peer_selected_tip).await {
            Ok(true) => {
                self.ctx.consensus_manager.commit_staging_consensus();
                log::info!("IBD pruning point sync committed");
                Ok(())
            }
            Ok(false) => {
                // Finality violation: stop quietly without banning
                self.ctx.consensus_manager.cancel_staging_consensus();
                Ok(())
            }
            Err(err) => {
                self.ctx.consensus_manager.cancel_staging_consensus();
                Err(err)
            }
        }
    }

    /// Returns `Ok(false)` for the silent-abort (finality violation) path
    async fn pruning_point_sync_inner(&mut self, staging: &DynConsensus, peer_selected_tip: Hash) -> Result<bool, ProtocolError> {
        // Step 1: the pruning point and its anticone, with GHOSTDAG metadata
        self.router.enqueue(Message::RequestPruningPointAndItsAnticone).await?;
        let mut pruning_point: Option<Hash> = None;
        loop {
            let message = self.routes.metadata_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await?;
            match message {
                Message::BlockWithMetaData { block, blue_score, blue_work, multiset } => {
                    let hash = block.hash();
                    // The pruning point is streamed first by protocol
                    if pruning_point.is_none() {
                        pruning_point = Some(hash);
                    }
                    let multiset = Multiset::deserialize(multiset)
                        .map_err(|_| ProtocolError::ConsensusViolation(format!("trusted block {hash} carries a corrupt multiset")))?;
                    staging
                        .validate_and_insert_trusted_block(block, blue_score, blue_work, multiset)
                        .map_err(|err| ProtocolError::ConsensusViolation(format!("trusted block {hash} was rejected: {err}")))?;
                }
                Message::DoneBlocksWithMetaData => break,
                other => return Err(ProtocolError::UnexpectedMessage { expected: "BlockWithMetaData", got: other.command() }),
            }
        }
        let Some(pruning_point) = pruning_point else {
            return Err(ProtocolError::ConsensusViolation("peer sent an empty pruning point anticone".to_string()));
        };
        if !staging.is_valid_pruning_point(pruning_point) {
            return Err(ProtocolError::ConsensusViolation(format!("peer pruning point {pruning_point} is invalid")));
        }
        match staging.validate_and_insert_imported_pruning_point(pruning_point) {
            Ok(()) => {}
            Err(PruningImportError::PruningImportFinalityViolation(_)) => {
                log::warn!("IBD, pruning point {} violates finality, aborting sync", pruning_point);
                return Ok(false);
            }
            Err(err) => {
                return Err(ProtocolError::ConsensusViolation(format!("pruning point {pruning_point} was rejected: {err}")));
            }
        }

        // Step 2: the pruning point UTXO set, streamed in chunks and verified
        // against the pruning point's UTXO commitment
        self.router.enqueue(Message::RequestPruningPointUTXOSet(pruning_point)).await?;
        let mut multiset = Multiset::new();
        loop {
            let message = self.routes.chunks_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await?;
            match message {
                Message::PruningPointUtxoSetChunk(chunk) => {
                    staging.append_imported_pruning_point_utxos(&chunk, &mut multiset);
                }
                Message::DonePruningPointUtxoSetChunks => break,
                Message::UnexpectedPruningPoint => {
                    // The peer moved to a different pruning point meanwhile
                    return Err(ProtocolError::OtherOwned("peer no longer serves the requested pruning point".to_string()));
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "PruningPointUtxoSetChunk", got: other.command() }),
            }
        }
        staging
            .import_pruning_point_utxo_set(pruning_point, &mut multiset)
            .map_err(|err| ProtocolError::ConsensusViolation(format!("imported UTXO set was rejected: {err}")))?;

        // Step 3: stream the blocks above the pruning point
        self.sync_missing_blocks(staging, pruning_point, peer_selected_tip).await?;
        Ok(true)
    }
}

#[async_trait]
impl Flow for IbdFlow {
    fn name(&self) -> &'static str {
        "IBD"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        while let Some(peer_selected_tip) = self.trigger_receiver.recv().await {
            if self.router.is_closed() {
                return Ok(());
            }
            self.ibd(peer_selected_tip).await?;
        }
        Ok(())
    }
}

/// Tracks the peer's selected tip announcements, triggering IBD when the peer
/// gets ahead of us
pub struct HandleSelectedTipUpdates {
    ctx: Arc<FlowContext>,
    _router: Arc<Router>,
    peer: Arc<Peer>,
    selected_tip_route: IncomingRoute,
}

impl HandleSelectedTipUpdates {
    pub fn new(ctx: Arc<FlowContext>, router: Arc<Router>, peer: Arc<Peer>, selected_tip_route: IncomingRoute) -> Self {
        Self { ctx, _router: router, peer, selected_tip_route }
    }
}

#[async_trait]
impl Flow for HandleSelectedTipUpdates {
    fn name(&self) -> &'static str {
        "HandleSelectedTipUpdates"
    }

    async fn start(&mut self) -> Result<(), ProtocolError> {
        loop {
            let message = self.selected_tip_route.dequeue().await?;
            match message {
                Message::SelectedTip(selected_tip) => {
                    self.peer.set_selected_tip(selected_tip);
                    if !self.ctx.consensus().block_exists(selected_tip) {
                        self.ctx.trigger_ibd(self.peer.key(), selected_tip);
                    }
                }
                other => return Err(ProtocolError::UnexpectedMessage { expected: "SelectedTip", got: other.command() }),
            }
        }
    }
}
