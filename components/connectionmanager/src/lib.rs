use norn_addressmanager::AddressManager;
use norn_p2p_lib::{Adaptor, NetAddress};
use parking_lot::Mutex as ParkingLotMutex;
use std::{
    collections::{HashMap, HashSet},
    net::IpAddr,
    sync::Arc,
    time::{Duration, SystemTime},
};
use tokio::{
    select,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    sync::Mutex as TokioMutex,
    time::interval,
};

const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Maintains the target number of outbound connections by dialing addresses
/// from the address manager, with permanent retries for explicitly requested peers
pub struct ConnectionManager {
    p2p_adaptor: Arc<Adaptor>,
    outbound_target: usize,
    amgr: Arc<ParkingLotMutex<AddressManager>>,
    connection_requests: TokioMutex<HashMap<NetAddress, ConnectionRequest>>,
    force_next_iteration: UnboundedSender<()>,
    shutdown_signal: UnboundedSender<()>,
}

#[derive(Clone, Copy)]
struct ConnectionRequest {
    next_attempt: SystemTime,
    is_permanent: bool,
    attempts: u32,
}

impl ConnectionManager {
    pub fn new(p2p_adaptor: Arc<Adaptor>, outbound_target: usize, amgr: Arc<ParkingLotMutex<AddressManager>>) -> Arc<Self> {
        let (tx, rx) = unbounded_channel::<()>();
        let (shutdown_tx, shutdown_rx) = unbounded_channel();
        let manager = Arc::new(Self {
            p2p_adaptor,
            outbound_target,
            amgr,
            connection_requests: Default::default(),
            force_next_iteration: tx,
            shutdown_signal: shutdown_tx,
        });
        manager.clone().start_event_loop(rx, shutdown_rx);
        let _ = manager.force_next_iteration.send(());
        manager
    }

    fn start_event_loop(self: Arc<Self>, mut rx: UnboundedReceiver<()>, mut shutdown_rx: UnboundedReceiver<()>) {
        let mut ticker = interval(MAINTENANCE_INTERVAL);
        tokio::spawn(async move {
            loop {
                select! {
                    _ = rx.recv() => self.handle_event().await,
                    _ = ticker.tick() => self.handle_event().await,
                    _ = shutdown_rx.recv() => break,
                }
            }
            log::debug!("Connection manager event loop exiting");
        });
    }

    async fn handle_event(&self) {
        self.handle_connection_requests().await;
        self.fill_outbound_slots().await;
    }

    /// Adds a peer the node must stay connected to (e.g. a `--connect` argument)
    pub async fn add_connection_request(&self, address: NetAddress, is_permanent: bool) {
        self.connection_requests
            .lock()
            .await
            .insert(address, ConnectionRequest { next_attempt: SystemTime::now(), is_permanent, attempts: 0 });
        let _ = self.force_next_iteration.send(());
    }

    pub fn stop(&self) {
        let _ = self.shutdown_signal.send(());
    }

    async fn handle_connection_requests(&self) {
        let mut requests = self.connection_requests.lock().await;
        let now = SystemTime::now();
        let due: Vec<NetAddress> = requests
            .iter()
            .filter(|(address, request)| request.next_attempt <= now && !self.p2p_adaptor.hub().is_connected(**address))
            .map(|(address, _)| *address)
            .collect();
        for address in due {
            log::debug!("Connection manager, dialing requested peer {address}");
            match self.p2p_adaptor.connect(address).await {
                Ok(_) => {
                    let request = requests.get_mut(&address).unwrap();
                    request.attempts = 0;
                    request.next_attempt = now + MAINTENANCE_INTERVAL;
                    if !request.is_permanent {
                        requests.remove(&address);
                    }
                }
                Err(err) => {
                    log::info!("Connection manager, failed dialing requested peer {address}: {err}");
                    let request = requests.get_mut(&address).unwrap();
                    request.attempts += 1;
                    // Exponential backoff, capped at 16 maintenance intervals
                    let backoff = MAINTENANCE_INTERVAL * 2u32.pow(request.attempts.min(4));
                    request.next_attempt = now + backoff;
                    if !request.is_permanent && request.attempts >= 3 {
                        requests.remove(&address);
                    }
                }
            }
        }
    }

    async fn fill_outbound_slots(&self) {
        let active_outbound: Vec<NetAddress> =
            self.p2p_adaptor.hub().routers().iter().filter(|router| router.is_outbound()).map(|router| router.net_address()).collect();
        if active_outbound.len() >= self.outbound_target {
            return;
        }
        let missing = self.outbound_target - active_outbound.len();

        let exclude: HashSet<IpAddr> = active_outbound.iter().map(|address| address.ip).collect();
        let candidates = self.amgr.lock().iterate_prioritized_random_addresses(exclude, missing);

        for address in candidates {
            log::debug!("Connection manager, dialing peer {address}");
            match self.p2p_adaptor.connect(address).await {
                Ok(_) => self.amgr.lock().mark_connection_success(address),
                Err(err) => {
                    log::debug!("Connection manager, failed dialing {address}: {err}");
                    self.amgr.lock().mark_connection_failure(address);
                }
            }
        }
    }
}
