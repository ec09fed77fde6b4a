use crate::common::NetAddress;
use crate::errors::ProtocolError;
use crate::router::Router;
use crate::wire::Message;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use uuid::Uuid;

/// Performs the application-level initialization of a fresh connection:
/// subscribing flow routes, starting the router, executing the handshake and
/// spawning the peer flows. An error fails and closes the connection.
#[async_trait]
pub trait ConnectionInitializer: Send + Sync {
    async fn initialize_connection(&self, router: Arc<Router>) -> Result<(), ProtocolError>;
}

/// The process-wide registry of active peer routers. Peers are registered once
/// their handshake completed ("ready"), making them visible to broadcasts.
#[derive(Clone, Default)]
pub struct Hub {
    peers: Arc<RwLock<HashMap<Uuid, Arc<Router>>>>,
}

impl Hub {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&self, router: Arc<Router>) {
        self.peers.write().insert(router.key(), router);
    }

    pub fn unregister(&self, key: Uuid) {
        self.peers.write().remove(&key);
    }

    pub fn routers(&self) -> Vec<Arc<Router>> {
        self.peers.read().values().cloned().collect()
    }

    pub fn has_peers(&self) -> bool {
        !self.peers.read().is_empty()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_connected(&self, address: NetAddress) -> bool {
        self.peers.read().values().any(|router| router.net_address().ip == address.ip)
    }

    /// Broadcasts a message to all ready peers, skipping the optionally given source
    pub async fn broadcast(&self, message: Message, skip: Option<Uuid>) {
        for router in self.routers() {
            if Some(router.key()) == skip {
                continue;
            }
            let _ = router.enqueue(message.clone()).await;
        }
    }
}

/// Binds the P2P layer together: accepts inbound connections, dials outbound
/// ones, and runs every new connection through the initializer
pub struct Adaptor {
    hub: Hub,
    initializer: Arc<dyn ConnectionInitializer>,
}

impl Adaptor {
    pub fn new(hub: Hub, initializer: Arc<dyn ConnectionInitializer>) -> Arc<Self> {
        Arc::new(Self { hub, initializer })
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Binds the listen address and serves inbound connections until process shutdown
    pub async fn listen(self: &Arc<Self>, listen_address: String) -> std::io::Result<()> {
        let listener = TcpListener::bind(&listen_address).await?;
        log::info!("P2P, listening on {}", listen_address);
        let adaptor = self.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, address)) => {
                        log::debug!("P2P, accepted connection from {}", address);
                        adaptor.spawn_connection(stream, false);
                    }
                    Err(err) => {
                        log::warn!("P2P, failed accepting a connection: {}", err);
                    }
                }
            }
        });
        Ok(())
    }

    /// Dials a peer and initializes the connection; returns the peer key
    pub async fn connect(self: &Arc<Self>, address: NetAddress) -> Result<Uuid, ProtocolError> {
        let stream = TcpStream::connect(std::net::SocketAddr::from(address))
            .await
            .map_err(|err| ProtocolError::OtherOwned(format!("dial to {address} failed: {err}")))?;
        let router = Router::new(stream, true);
        let key = router.key();
        self.initialize(router).await?;
        Ok(key)
    }

    fn spawn_connection(self: &Arc<Self>, stream: TcpStream, is_outbound: bool) {
        let adaptor = self.clone();
        tokio::spawn(async move {
            let router = Router::new(stream, is_outbound);
            if let Err(err) = adaptor.initialize(router).await {
                log::debug!("P2P, inbound connection initialization failed: {}", err);
            }
        });
    }

    async fn initialize(self: &Arc<Self>, router: Arc<Router>) -> Result<(), ProtocolError> {
        let result = self.initializer.initialize_connection(router.clone()).await;
        if let Err(ref err) = result {
            // A rejection note is sent on a best-effort basis before closing
            router.try_enqueue(Message::Reject { reason: err.to_string() });
            router.close();
        }
        // Cleanup once the connection terminates, whether it became ready or not
        let hub = self.hub.clone();
        let cleanup_router = router.clone();
        tokio::spawn(async move {
            cleanup_router.closed().await;
            hub.unregister(cleanup_router.key());
        });
        result
    }

    /// Closes all active connections
    pub fn terminate_all(&self) {
        for router in self.hub.routers() {
            router.close();
        }
    }
}
