pub mod genesis;
pub mod params;

use params::Params;
use std::ops::Deref;

/// Node configuration: consensus params plus process-level policy
#[derive(Clone, Debug)]
pub struct Config {
    /// Consensus parameters
    pub params: Params,

    /// Do not accept or relay transactions
    pub disable_relay_tx: bool,

    /// The target number of outbound peers maintained by the connection manager
    pub outbound_target: usize,

    /// Maximum number of inbound connections
    pub inbound_limit: usize,

    pub user_agent: String,
}

impl Config {
    pub fn new(params: Params) -> Self {
        Self { params, disable_relay_tx: false, outbound_target: 8, inbound_limit: 128, user_agent: format!("/nornd:{}/", env!("CARGO_PKG_VERSION")) }
    }
}

impl Deref for Config {
    type Target = Params;

    fn deref(&self) -> &Self::Target {
        &self.params
    }
}

impl AsRef<Params> for Config {
    fn as_ref(&self) -> &Params {
        &self.params
    }
}
