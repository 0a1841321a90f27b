use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct KeyCliArgs {
    /// Hex encoded private keys of the signing accounts.
    #[arg(env = "ORACLE_NODE_PRIVATE_KEYS", long, value_delimiter = ',')]
    pub private_keys: Vec<String>,
}
