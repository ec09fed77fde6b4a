use super::genesis::{GenesisBlock, GENESIS, SIMNET_GENESIS, TESTNET_GENESIS};
use crate::constants::MOTES_PER_NORN;
use norn_math::Uint256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    Simnet,
}

impl NetworkType {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkType::Mainnet => "norn-mainnet",
            NetworkType::Testnet => "norn-testnet",
            NetworkType::Simnet => "norn-simnet",
        }
    }

    pub fn default_p2p_port(&self) -> u16 {
        match self {
            NetworkType::Mainnet => 16611,
            NetworkType::Testnet => 16711,
            NetworkType::Simnet => 16811,
        }
    }
}

/// Consensus parameters. Contains settings and configurations which are consensus-sensitive.
/// Changing one of these on a network node would exclude and prevent it from reaching consensus
/// with the other unmodified nodes.
#[derive(Clone, Debug)]
pub struct Params {
    pub net: NetworkType,
    pub genesis: GenesisBlock,

    /// Maximum anticone size a blue block may have
    pub ghostdag_k: u8,

    /// Timestamp deviation tolerance in blocks; derives the past median time
    /// window size and the allowed future skew
    pub timestamp_deviation_tolerance: u64,

    /// Expected time between blocks, in milliseconds
    pub target_time_per_block: u64,

    /// Number of chain blocks sampled by the difficulty retarget
    pub difficulty_window_size: usize,

    /// The highest allowed proof of work target
    pub max_difficulty_target: Uint256,

    /// Soft limit on the number of parents a built block references
    pub max_block_parents: u8,

    /// Upper bound on a block's mergeset size
    pub mergeset_size_limit: u64,

    /// Number of blue scores a coinbase output must age before it may be spent
    pub coinbase_maturity: u64,

    /// Depth below the virtual selected parent past which reorgs are rejected
    pub finality_depth: u64,

    /// Depth below which block bodies may be discarded and the UTXO set snapshot rules
    pub pruning_depth: u64,

    pub max_tx_mass: u64,
    pub max_block_mass: u64,
    pub mass_per_tx_byte: u64,
    pub mass_per_script_pub_key_byte: u64,
    pub mass_per_sig_op: u64,

    /// Subsidy of a block at blue score zero
    pub base_subsidy: u64,
    /// Blue score interval between subsidy halvings
    pub subsidy_halving_interval: u64,

    /// Maximum gas limit a subnetwork may register with
    pub max_subnetwork_gas_limit: u64,
}

impl Params {
    /// The past median time window size: `2 * tolerance - 1`
    pub fn past_median_time_window_size(&self) -> usize {
        (2 * self.timestamp_deviation_tolerance - 1) as usize
    }

    /// Maximum amount a block timestamp may exceed local clock time, in milliseconds
    pub fn timestamp_max_future_skew(&self) -> u64 {
        self.timestamp_deviation_tolerance * self.target_time_per_block
    }

    /// Expected blocks per second, used for the `is_synced` staleness heuristic
    pub fn bps(&self) -> f64 {
        1000.0 / self.target_time_per_block as f64
    }

    pub fn network_name(&self) -> &'static str {
        self.net.name()
    }
}

pub static MAINNET_PARAMS: std::sync::LazyLock<Params> = std::sync::LazyLock::new(|| Params {
    net: NetworkType::Mainnet,
    genesis: GENESIS,
    ghostdag_k: 18,
    timestamp_deviation_tolerance: 132,
    target_time_per_block: 1000,
    difficulty_window_size: 2641,
    max_difficulty_target: Uint256::from_compact_target_bits(GENESIS.bits).unwrap(),
    max_block_parents: 10,
    mergeset_size_limit: 180,
    coinbase_maturity: 100,
    finality_depth: 86_400,
    pruning_depth: 185_798,
    max_tx_mass: 100_000,
    max_block_mass: 500_000,
    mass_per_tx_byte: 1,
    mass_per_script_pub_key_byte: 10,
    mass_per_sig_op: 1000,
    base_subsidy: 50 * MOTES_PER_NORN,
    subsidy_halving_interval: 43_200_000,
    max_subnetwork_gas_limit: 1_000_000_000,
});

pub static TESTNET_PARAMS: std::sync::LazyLock<Params> = std::sync::LazyLock::new(|| Params {
    net: NetworkType::Testnet,
    genesis: TESTNET_GENESIS,
    ghostdag_k: 18,
    timestamp_deviation_tolerance: 132,
    target_time_per_block: 1000,
    difficulty_window_size: 2641,
    max_difficulty_target: Uint256::from_compact_target_bits(TESTNET_GENESIS.bits).unwrap(),
    max_block_parents: 10,
    mergeset_size_limit: 180,
    coinbase_maturity: 100,
    finality_depth: 86_400,
    pruning_depth: 185_798,
    max_tx_mass: 100_000,
    max_block_mass: 500_000,
    mass_per_tx_byte: 1,
    mass_per_script_pub_key_byte: 10,
    mass_per_sig_op: 1000,
    base_subsidy: 50 * MOTES_PER_NORN,
    subsidy_halving_interval: 43_200_000,
    max_subnetwork_gas_limit: 1_000_000_000,
});

pub static SIMNET_PARAMS: std::sync::LazyLock<Params> = std::sync::LazyLock::new(|| Params {
    net: NetworkType::Simnet,
    genesis: SIMNET_GENESIS,
    ghostdag_k: 10,
    timestamp_deviation_tolerance: 132,
    target_time_per_block: 1000,
    difficulty_window_size: 2641,
    max_difficulty_target: Uint256::from_compact_target_bits(SIMNET_GENESIS.bits).unwrap(),
    max_block_parents: 10,
    mergeset_size_limit: 100,
    coinbase_maturity: 100,
    finality_depth: 86_400,
    pruning_depth: 185_798,
    max_tx_mass: 100_000,
    max_block_mass: 500_000,
    mass_per_tx_byte: 1,
    mass_per_script_pub_key_byte: 10,
    mass_per_sig_op: 1000,
    base_subsidy: 50 * MOTES_PER_NORN,
    subsidy_halving_interval: 43_200_000,
    max_subnetwork_gas_limit: 1_000_000_000,
});

impl From<NetworkType> for Params {
    fn from(net: NetworkType) -> Self {
        match net {
            NetworkType::Mainnet => MAINNET_PARAMS.clone(),
            NetworkType::Testnet => TESTNET_PARAMS.clone(),
            NetworkType::Simnet => SIMNET_PARAMS.clone(),
        }
    }
}
