use norn_database::prelude::{CachedDbAccess, DirectDbWriter, StoreError, StoreResult, DB};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::IpAddr;
use std::sync::Arc;

const STORE_PREFIX: &[u8] = b"banned-addresses";

/// Timestamp (unix millis) at which the ban was applied
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionBanTimestamp(pub u64);

pub trait BannedAddressesStoreReader {
    fn get(&self, ip: IpAddr) -> Result<ConnectionBanTimestamp, StoreError>;
    fn iterate_all(&self) -> Vec<(IpAddr, ConnectionBanTimestamp)>;
}

pub trait BannedAddressesStore: BannedAddressesStoreReader {
    fn set(&mut self, ip: IpAddr, timestamp: ConnectionBanTimestamp) -> StoreResult<()>;
    fn remove(&mut self, ip: IpAddr) -> StoreResult<()>;
}

const IP_KEY_SIZE: usize = 16;

#[derive(Eq, Hash, PartialEq, Debug, Copy, Clone)]
struct AddressKey([u8; IP_KEY_SIZE]);

impl AsRef<[u8]> for AddressKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for AddressKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", IpAddr::from(*self))
    }
}

impl From<IpAddr> for AddressKey {
    fn from(ip: IpAddr) -> Self {
        Self(match ip {
            IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
            IpAddr::V6(v6) => v6.octets(),
        })
    }
}

impl From<AddressKey> for IpAddr {
    fn from(key: AddressKey) -> Self {
        let v6 = std::net::Ipv6Addr::from(key.0);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }
}

#[derive(Clone)]
pub struct DbBannedAddressesStore {
    db: Arc<DB>,
    access: CachedDbAccess<AddressKey, ConnectionBanTimestamp>,
}

impl DbBannedAddressesStore {
    pub fn new(db: Arc<DB>, cache_size: u64) -> Self {
        Self { db: Arc::clone(&db), access: CachedDbAccess::new(db, cache_size, STORE_PREFIX.to_vec()) }
    }

    pub fn has(&self, ip: IpAddr) -> Result<bool, StoreError> {
        self.access.has(ip.into())
    }
}

impl BannedAddressesStoreReader for DbBannedAddressesStore {
    fn get(&self, ip: IpAddr) -> Result<ConnectionBanTimestamp, StoreError> {
        self.access.read(ip.into())
    }

    fn iterate_all(&self) -> Vec<(IpAddr, ConnectionBanTimestamp)> {
        self.access
            .iterator()
            .filter_map(|result| result.ok())
            .filter_map(|(key_bytes, timestamp)| {
                let key = AddressKey(key_bytes.as_ref().try_into().ok()?);
                Some((IpAddr::from(key), timestamp))
            })
            .collect()
    }
}

impl BannedAddressesStore for DbBannedAddressesStore {
    fn set(&mut self, ip: IpAddr, timestamp: ConnectionBanTimestamp) -> StoreResult<()> {
        self.access.write(DirectDbWriter::new(self.db.clone()), ip.into(), timestamp)
    }

    fn remove(&mut self, ip: IpAddr) -> StoreResult<()> {
        self.access.delete(DirectDbWriter::new(self.db.clone()), ip.into())
    }
}
