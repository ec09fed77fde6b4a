use crate::constants::perf;
use norn_consensus_core::subnets::SubnetworkId;
use norn_database::prelude::{CachedDbAccess, DbWriter, StoreError, DB};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubnetworkData {
    pub gas_limit: u64,
}

pub trait SubnetworksStoreReader {
    fn get(&self, id: SubnetworkId) -> Result<SubnetworkData, StoreError>;
    fn has(&self, id: SubnetworkId) -> Result<bool, StoreError>;
}

pub trait SubnetworksStore: SubnetworksStoreReader {
    fn insert(&mut self, writer: impl DbWriter, id: SubnetworkId, data: SubnetworkData) -> Result<(), StoreError>;
}

const STORE_PREFIX: &[u8] = b"subnetworks";

#[derive(Clone)]
pub struct DbSubnetworksStore {
    access: CachedDbAccess<SubnetworkId, SubnetworkData>,
}

impl DbSubnetworksStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { access: CachedDbAccess::new(db, perf::DEFAULT_CACHE_SIZE, STORE_PREFIX.to_vec()) }
    }
}

impl SubnetworksStoreReader for DbSubnetworksStore {
    fn get(&self, id: SubnetworkId) -> Result<SubnetworkData, StoreError> {
        self.access.read(id)
    }

    fn has(&self, id: SubnetworkId) -> Result<bool, StoreError> {
        self.access.has(id)
    }
}

impl SubnetworksStore for DbSubnetworksStore {
    fn insert(&mut self, writer: impl DbWriter, id: SubnetworkId, data: SubnetworkData) -> Result<(), StoreError> {
        self.access.write(writer, id, data)
    }
}
