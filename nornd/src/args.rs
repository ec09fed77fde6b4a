use clap::Parser;
use norn_consensus_core::config::params::NetworkType;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nornd", version, about = "Norn full node daemon")]
pub struct Args {
    /// Application data directory (defaults to ~/.nornd/<network>)
    #[arg(long = "appdir")]
    pub app_dir: Option<PathBuf>,

    /// Use the test network
    #[arg(long)]
    pub testnet: bool,

    /// Use the simulation network
    #[arg(long)]
    pub simnet: bool,

    /// P2P listen address
    #[arg(long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Override the default P2P port
    #[arg(long)]
    pub port: Option<u16>,

    /// Connect only to the given peers at startup (may be repeated)
    #[arg(long = "connect")]
    pub connect_peers: Vec<String>,

    /// Add peers to connect to (may be repeated)
    #[arg(long = "addpeer")]
    pub add_peers: Vec<String>,

    /// Target number of outbound peers
    #[arg(long, default_value_t = 8)]
    pub outbound_target: usize,

    /// Maximum number of inbound peers
    #[arg(long, default_value_t = 128)]
    pub inbound_limit: usize,

    /// Disable accepting and relaying transactions
    #[arg(long)]
    pub norelay: bool,

    /// Logging level filter (e.g. `info`, `debug,norn_consensus=trace`)
    #[arg(long, default_value = "info")]
    pub loglevel: String,
}

impl Args {
    pub fn network(&self) -> NetworkType {
        match (self.testnet, self.simnet) {
            (false, false) => NetworkType::Mainnet,
            (true, false) => NetworkType::Testnet,
            (false, true) => NetworkType::Simnet,
            (true, true) => {
                eprintln!("--testnet and --simnet are mutually exclusive");
                std::process::exit(1);
            }
        }
    }

    pub fn app_dir(&self) -> PathBuf {
        match &self.app_dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir().expect("a home directory is required").join(".nornd").join(match self.network() {
                NetworkType::Mainnet => "mainnet",
                NetworkType::Testnet => "testnet",
                NetworkType::Simnet => "simnet",
            }),
        }
    }

    pub fn p2p_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.network().default_p2p_port())
    }
}
