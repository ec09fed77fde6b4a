use crate::flow_context::FlowContext;
use crate::v1::{address, blockrelay, ibd, ping, rejects, request_handlers, txrelay};
use crate::{launch_flow, Flow, MINIMUM_PROTOCOL_VERSION, PROTOCOL_VERSION};
use async_trait::async_trait;
use norn_p2p_lib::{
    ConnectionInitializer, IncomingRoute, Message, MessageCommand, ProtocolError, Router, VersionMessage, DEFAULT_TIMEOUT,
};
use norn_p2p_lib::Peer;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

/// Initializes fresh peer connections: subscribes all flow routes, performs
/// the two-sided version handshake, registers the peer and launches its flows
pub struct NornConnectionInitializer {
    ctx: Arc<FlowContext>,
}

impl NornConnectionInitializer {
    pub fn new(ctx: Arc<FlowContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    fn build_version_message(&self, router: &Router) -> VersionMessage {
        VersionMessage {
            protocol_version: PROTOCOL_VERSION,
            network: self.ctx.config.params.network_name().to_string(),
            services: 0,
            timestamp: self.ctx.local_time(),
            address: router.net_address(),
            id: self.ctx.node_id,
            user_agent: self.ctx.config.user_agent.clone(),
            selected_tip_hash: self.ctx.consensus().get_virtual_selected_parent(),
            subnetwork_id: None,
            disable_relay_tx: self.ctx.config.disable_relay_tx,
        }
    }

    fn validate_remote_version(&self, router: &Router, remote: &VersionMessage) -> Result<(), ProtocolError> {
        if remote.id == self.ctx.node_id {
            return Err(ProtocolError::LoopbackConnection);
        }
        let local_network = self.ctx.config.params.network_name();
        if remote.network != local_network {
            return Err(ProtocolError::WrongNetwork { expected: local_network.to_string(), got: remote.network.clone() });
        }
        if remote.protocol_version < MINIMUM_PROTOCOL_VERSION {
            return Err(ProtocolError::ObsoleteProtocolVersion(remote.protocol_version, MINIMUM_PROTOCOL_VERSION));
        }
        // This node is a full node; dialing out to a partial node would leave
        // us unable to fetch arbitrary transactions from it
        if router.is_outbound() && remote.subnetwork_id.is_some() {
            return Err(ProtocolError::IncompatibleSubnetwork);
        }
        Ok(())
    }

    /// The two parallel handshake sub-flows: sending our version while
    /// receiving and validating the peer's
    async fn handshake(
        &self,
        router: &Arc<Router>,
        version_route: IncomingRoute,
        verack_route: IncomingRoute,
    ) -> Result<VersionMessage, ProtocolError> {
        let send = async {
            router.enqueue(Message::Version(Box::new(self.build_version_message(router)))).await?;
            match verack_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
                Message::VerAck => Ok(()),
                other => Err(ProtocolError::UnexpectedMessage { expected: "VerAck", got: other.command() }),
            }
        };
        let receive = async {
            let version = match version_route.dequeue_with_timeout(DEFAULT_TIMEOUT).await? {
                Message::Version(version) => version,
                other => return Err(ProtocolError::UnexpectedMessage { expected: "Version", got: other.command() }),
            };
            self.validate_remote_version(router, &version)?;
            router.enqueue(Message::VerAck).await?;
            Ok(version)
        };

        let (send_result, receive_result) = tokio::join!(send, receive);
        send_result?;
        receive_result.map(|boxed| *boxed)
    }
}

#[async_trait]
impl ConnectionInitializer for NornConnectionInitializer {
    async fn initialize_connection(&self, router: Arc<Router>) -> Result<(), ProtocolError> {
        let ctx = &self.ctx;

        // All routes are subscribed before the router starts, so no incoming
        // message can arrive without a destination
        let version_route = router.subscribe(&[MessageCommand::Version]);
        let verack_route = router.subscribe(&[MessageCommand::VerAck]);
        let rejects_route = router.subscribe(&[MessageCommand::Reject]);
        let request_addresses_route = router.subscribe(&[MessageCommand::RequestAddresses]);
        let addresses_route = router.subscribe(&[MessageCommand::Addresses]);
        let ping_route = router.subscribe(&[MessageCommand::Ping]);
        let pong_route = router.subscribe(&[MessageCommand::Pong]);
        let invs_route = router.subscribe(&[MessageCommand::InvRelayBlock]);
        let blocks_route = router.subscribe(&[MessageCommand::Block]);
        let relay_requests_route = router.subscribe(&[MessageCommand::RequestRelayBlocks]);
        let tx_invs_route = router.subscribe(&[MessageCommand::InvTransactions]);
        let txs_route = router.subscribe(&[MessageCommand::Tx, MessageCommand::TransactionNotFound]);
        let tx_requests_route = router.subscribe(&[MessageCommand::RequestTransactions]);
        let ibd_routes = ibd::IbdClientRoutes {
            locator_route: router.subscribe(&[MessageCommand::BlockLocator]),
            blocks_route: router.subscribe(&[MessageCommand::IBDBlock, MessageCommand::DoneIBDBlocks]),
            metadata_route: router.subscribe(&[MessageCommand::BlockWithMetaData, MessageCommand::DoneBlocksWithMetaData]),
            chunks_route: router.subscribe(&[
                MessageCommand::PruningPointUtxoSetChunk,
                MessageCommand::DonePruningPointUtxoSetChunks,
                MessageCommand::UnexpectedPruningPoint,
            ]),
            blue_work_route: router.subscribe(&[MessageCommand::BlockBlueWork]),
        };
        let selected_tip_route = router.subscribe(&[MessageCommand::SelectedTip]);
        let ibd_requests_route = router.subscribe(&[MessageCommand::RequestIBDBlocks, MessageCommand::RequestNextIBDBlocks]);
        let locator_requests_route = router.subscribe(&[MessageCommand::RequestBlockLocator]);
        let pruning_requests_route = router
            .subscribe(&[MessageCommand::RequestPruningPointAndItsAnticone, MessageCommand::RequestPruningPointUTXOSet]);
        let blue_work_requests_route = router.subscribe(&[MessageCommand::RequestBlockBlueWork]);
        let selected_tip_requests_route = router.subscribe(&[MessageCommand::RequestSelectedTip]);

        router.start();

        let version = self.handshake(&router, version_route, verack_route).await?;
        log::debug!(
            "P2P, handshake with peer {} completed: {} (protocol {})",
            router.net_address(),
            version.user_agent,
            version.protocol_version
        );

        let peer = Arc::new(Peer::new(router.clone(), &version, ctx.local_time()));
        let peer_selected_tip = version.selected_tip_hash;
        ctx.register_peer(peer.clone());
        ctx.hub.register(router.clone());

        // The IBD flow owns the trigger channel other flows signal through
        let (ibd_trigger_sender, ibd_trigger_receiver) = unbounded_channel();
        ctx.register_ibd_trigger(peer.key(), ibd_trigger_sender);

        let flows: Vec<Box<dyn Flow>> = vec![
            Box::new(rejects::HandleRejectsFlow::new(router.clone(), rejects_route)),
            Box::new(ping::SendPingsFlow::new(router.clone(), pong_route)),
            Box::new(ping::ReceivePingsFlow::new(router.clone(), ping_route)),
            Box::new(address::ReceiveAddressesFlow::new(ctx.clone(), router.clone(), addresses_route)),
            Box::new(address::SendAddressesFlow::new(ctx.clone(), router.clone(), request_addresses_route)),
            Box::new(blockrelay::HandleRelayInvsFlow::new(ctx.clone(), router.clone(), peer.clone(), invs_route, blocks_route)),
            Box::new(blockrelay::HandleRelayBlockRequests::new(ctx.clone(), router.clone(), relay_requests_route)),
            Box::new(txrelay::RelayTransactionsFlow::new(ctx.clone(), router.clone(), peer.clone(), tx_invs_route, txs_route)),
            Box::new(txrelay::HandleRequestedTransactionsFlow::new(ctx.clone(), router.clone(), tx_requests_route)),
            Box::new(ibd::IbdFlow::new(ctx.clone(), router.clone(), peer.clone(), ibd_routes, ibd_trigger_receiver)),
            Box::new(ibd::HandleSelectedTipUpdates::new(ctx.clone(), router.clone(), peer.clone(), selected_tip_route)),
            Box::new(request_handlers::HandleIbdBlockRequests::new(ctx.clone(), router.clone(), ibd_requests_route)),
            Box::new(request_handlers::HandleBlockLocatorRequests::new(ctx.clone(), router.clone(), locator_requests_route)),
            Box::new(request_handlers::HandlePruningPointRequests::new(ctx.clone(), router.clone(), pruning_requests_route)),
            Box::new(request_handlers::HandleBlueWorkRequests::new(ctx.clone(), router.clone(), blue_work_requests_route)),
            Box::new(request_handlers::HandleSelectedTipRequests::new(ctx.clone(), router.clone(), selected_tip_requests_route)),
        ];
        for flow in flows {
            launch_flow(ctx.clone(), router.clone(), flow);
        }

        // Context cleanup once the connection terminates
        {
            let ctx = ctx.clone();
            let router = router.clone();
            tokio::spawn(async move {
                router.closed().await;
                ctx.unregister_ibd_trigger(router.key());
                ctx.unregister_peer(router.key());
            });
        }

        // Store the peer address for future dials, and ask for more
        if router.is_outbound() {
            self.ctx.address_manager.lock().add_address(router.net_address());
        }
        router.enqueue(Message::RequestAddresses).await?;

        // An unknown advertised selected tip may require syncing towards it
        if !ctx.consensus().block_exists(peer_selected_tip) {
            ctx.trigger_ibd(peer.key(), peer_selected_tip);
        }

        Ok(())
    }
}
