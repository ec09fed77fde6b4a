use norn_consensus_core::api::DynConsensus;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A staging consensus instance: a sandboxed DAG built during a pruning-point
/// sync, discarded wholesale on failure. The lifetime guard keeps its backing
/// storage alive (and deletes it when dropped).
pub struct StagingConsensus {
    pub consensus: DynConsensus,
    _lifetime: Box<dyn std::any::Any + Send + Sync>,
}

impl StagingConsensus {
    pub fn new(consensus: DynConsensus, lifetime: Box<dyn std::any::Any + Send + Sync>) -> Self {
        Self { consensus, _lifetime: lifetime }
    }
}

/// Creates fresh consensus instances for staging purposes
pub trait ConsensusFactory: Send + Sync {
    fn new_staging_consensus(&self) -> StagingConsensus;
}

/// Tracks the currently active consensus and an optional staging instance.
/// Committing a staging instance atomically makes it the active one.
pub struct ConsensusManager {
    factory: Arc<dyn ConsensusFactory>,
    active: RwLock<DynConsensus>,
    staging: Mutex<Option<StagingConsensus>>,
}

impl ConsensusManager {
    pub fn new(factory: Arc<dyn ConsensusFactory>, active: DynConsensus) -> Arc<Self> {
        Arc::new(Self { factory, active: RwLock::new(active), staging: Mutex::new(None) })
    }

    /// The active consensus; callers should re-acquire after an IBD completes
    /// rather than holding the instance long-term
    pub fn consensus(&self) -> DynConsensus {
        self.active.read().clone()
    }

    /// Starts a staging consensus, replacing any previous (uncommitted) one
    pub fn begin_staging_consensus(&self) -> DynConsensus {
        let staging = self.factory.new_staging_consensus();
        let consensus = staging.consensus.clone();
        *self.staging.lock() = Some(staging);
        consensus
    }

    /// Promotes the staging consensus to be the active one
    pub fn commit_staging_consensus(&self) {
        let Some(staging) = self.staging.lock().take() else {
            panic!("commit was called with no staging consensus in progress");
        };
        *self.active.write() = staging.consensus.clone();
        // Keep the staging storage alive for the lifetime of the process by
        // leaking the guard; it is now the active consensus storage
        std::mem::forget(staging);
        log::info!("staging consensus committed and promoted to active");
    }

    /// Deletes the staging consensus and its backing storage
    pub fn cancel_staging_consensus(&self) {
        if self.staging.lock().take().is_some() {
            log::info!("staging consensus deleted");
        }
    }

    pub fn has_staging_consensus(&self) -> bool {
        self.staging.lock().is_some()
    }
}
