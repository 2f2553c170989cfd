use crate::{
    bindings::DEFAULT_BINDINGS_FILE,
    types::Amount,
};
use clap::{
    Parser,
    Subcommand,
};
use std::{
    path::PathBuf,
    str::FromStr,
    time::Duration,
};
use url::Url;

pub const DEFAULT_RPC_URL: &str = "http://localhost:8545";
pub const DEFAULT_LOG_DIR: &str = ".logs";
pub const DEFAULT_NETWORK_POLL_SECS: u64 = 4;

#[derive(Parser, Debug)]
#[command(
    name = "lottery-client",
    about = "Follow the on-chain lottery and enter it",
    version,
    arg_required_else_help = true
)]
pub struct Cli {
    /// JSON-RPC endpoint of the node
    #[arg(long, env = "LOTTERY_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: Url,

    /// Chain id to contract address mapping
    #[arg(long, default_value = DEFAULT_BINDINGS_FILE)]
    pub bindings: String,

    /// Encrypted JSON keystore used to sign entries
    #[arg(long)]
    pub keystore: Option<String>,

    /// Seconds between chain id checks
    #[arg(long, default_value_t = DEFAULT_NETWORK_POLL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub network_poll_secs: u64,

    /// Directory for the rolling log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_secs(self.network_poll_secs)
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print every state change and notification until interrupted
    Watch,
    /// Enter the lottery once and wait for the result
    Enter {
        /// Amount in wei (defaults to the current entrance fee)
        #[arg(long, value_parser = parse_amount)]
        amount: Option<Amount>,
    },
}

/// Expands a leading `~` in user-supplied file paths.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn parse_amount(raw: &str) -> Result<Amount, String> {
    Amount::from_str(raw.trim()).map_err(|err| format!("invalid wei amount {raw:?}: {err}"))
}
