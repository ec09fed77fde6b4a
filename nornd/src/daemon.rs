use crate::api::OpsService;
use crate::args::Args;
use norn_addressmanager::AddressManager;
use norn_connectionmanager::ConnectionManager;
use norn_consensus::Consensus;
use norn_consensus_core::config::{params::Params, Config};
use norn_consensus_core::notify::Notification;
use norn_consensusmanager::{ConsensusFactory, ConsensusManager, StagingConsensus};
use norn_database::prelude::{create_temp_db, open_db};
use norn_mempool::{config::Config as MempoolConfig, Mempool};
use norn_p2p_flows::v1::NornConnectionInitializer;
use norn_p2p_flows::FlowContext;
use norn_p2p_lib::{Adaptor, Hub, NetAddress};
use std::net::SocketAddr;
use std::sync::Arc;

/// Creates fresh sandboxed consensus instances over temporary databases,
/// used for pruning point syncs
struct StagingConsensusFactory {
    config: Arc<Config>,
}

impl ConsensusFactory for StagingConsensusFactory {
    fn new_staging_consensus(&self) -> StagingConsensus {
        let (lifetime, db) = create_temp_db();
        let consensus = Arc::new(Consensus::new(db, self.config.clone()));
        StagingConsensus::new(consensus, Box::new(lifetime))
    }
}

pub struct Daemon {
    pub ctx: Arc<FlowContext>,
    pub ops: Arc<OpsService>,
    pub adaptor: Arc<Adaptor>,
    pub connection_manager: Arc<ConnectionManager>,
}

impl Daemon {
    pub async fn start(args: &Args) -> Self {
        let params: Params = args.network().into();
        let mut config = Config::new(params);
        config.disable_relay_tx = args.norelay;
        config.outbound_target = args.outbound_target;
        config.inbound_limit = args.inbound_limit;
        let config = Arc::new(config);

        let app_dir = args.app_dir();
        std::fs::create_dir_all(&app_dir).expect("the application directory must be creatable");
        log::info!("nornd v{} starting on {}", env!("CARGO_PKG_VERSION"), config.params.network_name());
        log::info!("application directory: {}", app_dir.display());

        let db = open_db(app_dir.join("datadir"), num_cpus());
        let consensus = Arc::new(Consensus::new(db.clone(), config.clone()));
        log::info!("genesis block: {}", consensus.genesis_hash());

        let consensus_manager =
            ConsensusManager::new(Arc::new(StagingConsensusFactory { config: config.clone() }), consensus.clone());
        let mempool = Arc::new(Mempool::new(MempoolConfig::default()));
        let address_manager = AddressManager::new(db);
        let hub = Hub::new();

        let ctx = FlowContext::new(config.clone(), consensus_manager, mempool, address_manager, hub.clone());
        ctx.start_transaction_rebroadcast_task();

        let ops = OpsService::new(ctx.clone());
        Self::forward_consensus_notifications(&consensus, &ops);

        let initializer = NornConnectionInitializer::new(ctx.clone());
        let adaptor = Adaptor::new(hub, initializer);
        let listen_address = format!("{}:{}", args.listen, args.p2p_port());
        adaptor.listen(listen_address).await.expect("the P2P listen address must be bindable");

        let connection_manager = ConnectionManager::new(adaptor.clone(), config.outbound_target, ctx.address_manager.clone());
        for peer in args.connect_peers.iter().chain(args.add_peers.iter()) {
            match peer.parse::<SocketAddr>() {
                Ok(address) => connection_manager.add_connection_request(NetAddress::from(address), true).await,
                Err(err) => log::warn!("ignoring unparsable peer address {peer}: {err}"),
            }
        }

        Self { ctx, ops, adaptor, connection_manager }
    }

    /// Bridges consensus notifications into the ops service bookkeeping
    fn forward_consensus_notifications(consensus: &Arc<Consensus>, ops: &Arc<OpsService>) {
        let receiver = consensus.register_notification_listener();
        let ops = ops.clone();
        std::thread::spawn(move || {
            while let Ok(notification) = receiver.recv() {
                match notification {
                    Notification::BlockAdded(_) => ops.note_block_added(),
                    Notification::ChainChanged(_)
                    | Notification::FinalityConflict(_)
                    | Notification::FinalityConflictResolved(_)
                    | Notification::PruningPointUtxoSetOverride(_) => {}
                }
            }
        });
    }

    pub fn shutdown(&self) {
        log::info!("nornd shutting down...");
        self.connection_manager.stop();
        self.adaptor.terminate_all();
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}
