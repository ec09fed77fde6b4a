use norn_database::prelude::{CachedDbAccess, DirectDbWriter, StoreError, StoreResult, DB};
use norn_p2p_lib::NetAddress;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

const STORE_PREFIX: &[u8] = b"known-addresses";

/// A persisted address book entry
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct Entry {
    pub connection_failed_count: u64,
    pub address: NetAddress,
}

const ADDRESS_KEY_SIZE: usize = 16 + 2;

/// Binary key of an address: 16 IP bytes followed by the port
#[derive(Eq, Hash, PartialEq, Debug, Copy, Clone)]
pub struct AddressKey([u8; ADDRESS_KEY_SIZE]);

impl AsRef<[u8]> for AddressKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for AddressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", NetAddress::from(*self))
    }
}

impl From<NetAddress> for AddressKey {
    fn from(address: NetAddress) -> Self {
        let mut bytes = [0u8; ADDRESS_KEY_SIZE];
        bytes[..16].copy_from_slice(&address.ip_octets());
        bytes[16..].copy_from_slice(&address.port.to_le_bytes());
        Self(bytes)
    }
}

impl From<AddressKey> for NetAddress {
    fn from(key: AddressKey) -> Self {
        NetAddress::from_octets(key.0[..16].try_into().unwrap(), u16::from_le_bytes(key.0[16..].try_into().unwrap()))
    }
}

pub trait AddressesStoreReader {
    fn get(&self, address: NetAddress) -> Result<Entry, StoreError>;
    fn iterate_all(&self) -> Vec<Entry>;
}

pub trait AddressesStore: AddressesStoreReader {
    fn set(&mut self, address: NetAddress, entry: Entry) -> StoreResult<()>;
    fn remove(&mut self, address: NetAddress) -> StoreResult<()>;
}

#[derive(Clone)]
pub struct DbAddressesStore {
    db: Arc<DB>,
    access: CachedDbAccess<AddressKey, Entry>,
}

impl DbAddressesStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_size, STORE_PREFIX.to_vec()) }
    }
}

impl AddressesStoreReader for DbAddressesStore {
    fn get(&self, address: NetAddress) -> Result<Entry, StoreError> {
        self.access.read(address.into())
    }

    fn iterate_all(&self) -> Vec<Entry> {
        self.access.iterator().filter_map(|result| result.ok()).map(|(_, entry)| entry).collect()
    }
}

impl AddressesStore for DbAddressesStore {
    fn set(&mut self, address: NetAddress, entry: Entry) -> StoreResult<()> {
        self.access.write(DirectDbWriter::new(self.db.clone()), address.into(), entry)
    }

    fn remove(&mut self, address: NetAddress) -> StoreResult<()> {
        self.access.delete(DirectDbWriter::new(self.db.clone()), address.into())
    }
}
