use crate::common::NetAddress;
use crate::router::Router;
use crate::wire::VersionMessage;
use norn_consensus_core::subnets::SubnetworkId;
use norn_hashes::Hash;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Properties of a connected peer, populated during the handshake and updated
/// by the flows serving it
#[derive(Debug)]
pub struct PeerProperties {
    pub user_agent: String,
    pub advertised_protocol_version: u32,
    pub protocol_version: u32,
    pub subnetwork_id: Option<SubnetworkId>,
    pub disable_relay_tx: bool,
    /// Difference between the peer's clock and ours at handshake time, in milliseconds
    pub time_offset: i64,
}

pub struct Peer {
    router: Arc<Router>,
    /// The peer's random per-run identifier from its version message
    identity: [u8; 16],
    properties: RwLock<Arc<PeerProperties>>,
    selected_tip: RwLock<Hash>,
    connected_at: u64,
}

impl Peer {
    pub fn new(router: Arc<Router>, version: &VersionMessage, local_time: u64) -> Self {
        let properties = PeerProperties {
            user_agent: version.user_agent.clone(),
            advertised_protocol_version: version.protocol_version,
            protocol_version: version.protocol_version,
            subnetwork_id: version.subnetwork_id,
            disable_relay_tx: version.disable_relay_tx,
            time_offset: version.timestamp as i64 - local_time as i64,
        };
        Self {
            router,
            identity: version.id,
            properties: RwLock::new(Arc::new(properties)),
            selected_tip: RwLock::new(version.selected_tip_hash),
            connected_at: local_time,
        }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn key(&self) -> Uuid {
        self.router.key()
    }

    pub fn net_address(&self) -> NetAddress {
        self.router.net_address()
    }

    pub fn is_outbound(&self) -> bool {
        self.router.is_outbound()
    }

    pub fn identity(&self) -> [u8; 16] {
        self.identity
    }

    pub fn properties(&self) -> Arc<PeerProperties> {
        self.properties.read().clone()
    }

    pub fn selected_tip(&self) -> Hash {
        *self.selected_tip.read()
    }

    pub fn set_selected_tip(&self, selected_tip: Hash) {
        *self.selected_tip.write() = selected_tip;
    }

    pub fn connected_at(&self) -> u64 {
        self.connected_at
    }
}

impl std::fmt::Display for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net_address())
    }
}
