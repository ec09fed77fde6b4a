mod stores;

use itertools::Itertools;
use norn_core::time::unix_now;
use norn_database::prelude::{StoreResultExtensions, DB};
use norn_p2p_lib::NetAddress;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;
use stores::address_store::{AddressesStore, AddressesStoreReader, DbAddressesStore, Entry};
use stores::banned_address_store::{BannedAddressesStore, BannedAddressesStoreReader, ConnectionBanTimestamp, DbBannedAddressesStore};

const MAX_ADDRESSES: usize = 4096;
const MAX_CONNECTION_FAILED_COUNT: u64 = 3;

/// The process-wide address book: tracks known peer addresses with their
/// connection-failure counts, and the ban table. Banned addresses never leak
/// into the normal address table until explicitly unbanned.
pub struct AddressManager {
    address_store: DbAddressesStore,
    banned_address_store: DbBannedAddressesStore,
}

impl AddressManager {
    pub fn new(db: Arc<DB>) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            address_store: DbAddressesStore::new(db.clone(), MAX_ADDRESSES as u64),
            banned_address_store: DbBannedAddressesStore::new(db, MAX_ADDRESSES as u64),
        }))
    }

    /// Registers an address unless it is banned or the book is full
    pub fn add_address(&mut self, address: NetAddress) {
        if self.is_banned(address.ip) {
            return;
        }
        if self.address_store.get(address).unwrap_option().is_some() {
            return;
        }
        if self.address_store.iterate_all().len() >= MAX_ADDRESSES {
            return;
        }
        self.address_store.set(address, Entry { connection_failed_count: 0, address }).unwrap();
    }

    pub fn remove_address(&mut self, address: NetAddress) {
        self.address_store.remove(address).unwrap();
    }

    pub fn mark_connection_success(&mut self, address: NetAddress) {
        if self.address_store.get(address).unwrap_option().is_some() {
            self.address_store.set(address, Entry { connection_failed_count: 0, address }).unwrap();
        }
    }

    /// Increments the failure count; addresses failing too often are dropped
    pub fn mark_connection_failure(&mut self, address: NetAddress) {
        let Some(entry) = self.address_store.get(address).unwrap_option() else {
            return;
        };
        let connection_failed_count = entry.connection_failed_count + 1;
        if connection_failed_count > MAX_CONNECTION_FAILED_COUNT {
            log::debug!("address {address} failed {connection_failed_count} connection attempts, removing");
            self.address_store.remove(address).unwrap();
        } else {
            self.address_store.set(address, Entry { connection_failed_count, address }).unwrap();
        }
    }

    /// All known (non-banned) addresses
    pub fn get_all_addresses(&self) -> Vec<NetAddress> {
        self.address_store.iterate_all().into_iter().map(|entry| entry.address).collect()
    }

    /// Returns up to `count` random addresses, preferring ones with fewer
    /// connection failures and skipping excluded IPs
    pub fn iterate_prioritized_random_addresses(&self, exclude: HashSet<IpAddr>, count: usize) -> Vec<NetAddress> {
        let mut rng = thread_rng();
        let mut candidates = self
            .address_store
            .iterate_all()
            .into_iter()
            .filter(|entry| !exclude.contains(&entry.address.ip))
            .collect_vec();
        candidates.shuffle(&mut rng);
        candidates.sort_by_key(|entry| entry.connection_failed_count);
        candidates.into_iter().take(count).map(|entry| entry.address).collect()
    }

    /// Bans the IP and removes all its addresses from the normal table
    pub fn ban(&mut self, ip: IpAddr) {
        self.banned_address_store.set(ip, ConnectionBanTimestamp(unix_now())).unwrap();
        for entry in self.address_store.iterate_all() {
            if entry.address.ip == ip {
                self.address_store.remove(entry.address).unwrap();
            }
        }
        log::info!("banned peer address {ip}");
    }

    pub fn unban(&mut self, ip: IpAddr) {
        self.banned_address_store.remove(ip).unwrap();
    }

    pub fn is_banned(&self, ip: IpAddr) -> bool {
        self.banned_address_store.get(ip).unwrap_option().is_some()
    }

    pub fn banned_addresses(&self) -> Vec<IpAddr> {
        self.banned_address_store.iterate_all().into_iter().map(|(ip, _)| ip).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norn_database::prelude::create_temp_db;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    fn address(last_octet: u8) -> NetAddress {
        NetAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)), 16611)
    }

    #[test]
    fn test_add_and_sample() {
        let (_lifetime, db) = create_temp_db();
        let manager = AddressManager::new(db);
        let mut manager = manager.lock();

        for i in 1..=5 {
            manager.add_address(address(i));
        }
        assert_eq!(manager.get_all_addresses().len(), 5);

        let exclude: HashSet<IpAddr> = [address(1).ip].into_iter().collect();
        let sampled = manager.iterate_prioritized_random_addresses(exclude, 10);
        assert_eq!(sampled.len(), 4);
        assert!(sampled.iter().all(|a| a.ip != address(1).ip));
    }

    #[test]
    fn test_ban_isolation() {
        let (_lifetime, db) = create_temp_db();
        let manager = AddressManager::new(db);
        let mut manager = manager.lock();

        manager.add_address(address(1));
        manager.ban(address(1).ip);
        assert!(manager.is_banned(address(1).ip));
        // Banned addresses never appear in the normal table
        assert!(manager.get_all_addresses().is_empty());
        manager.add_address(address(1));
        assert!(manager.get_all_addresses().is_empty());

        manager.unban(address(1).ip);
        manager.add_address(address(1));
        assert_eq!(manager.get_all_addresses().len(), 1);
    }

    #[test]
    fn test_failure_eviction() {
        let (_lifetime, db) = create_temp_db();
        let manager = AddressManager::new(db);
        let mut manager = manager.lock();

        manager.add_address(address(1));
        for _ in 0..=MAX_CONNECTION_FAILED_COUNT {
            manager.mark_connection_failure(address(1));
        }
        assert!(manager.get_all_addresses().is_empty());
    }

    #[test]
    fn test_socket_addr_conversion() {
        let socket: SocketAddr = "10.0.0.7:16611".parse().unwrap();
        let address = NetAddress::from(socket);
        assert_eq!(SocketAddr::from(address), socket);
    }
}
