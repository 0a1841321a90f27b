use clap::Args;
use url::Url;

#[derive(Debug, Clone, Args)]
pub struct EthereumCliArgs {
    /// Websocket endpoint of the Ethereum node (ws:// or wss://).
    #[arg(env = "ORACLE_NODE_ETHEREUM_URL", long, default_value = "ws://localhost:8546")]
    pub ethereum_url: Url,

    /// Upper bound on outbound RPC calls per second.
    #[arg(env = "ORACLE_NODE_MAX_RPC_CALLS_PER_SECOND", long, default_value = "500")]
    pub max_rpc_calls_per_second: u32,

    #[arg(env = "ORACLE_NODE_ETHEREUM_CHAIN_ID", long, default_value = "1")]
    pub chain_id: u64,

    /// Gas price (wei) of the first attempt of every transaction.
    #[arg(env = "ORACLE_NODE_ETH_GAS_PRICE_DEFAULT", long, default_value = "20000000000")]
    pub eth_gas_price_default: u128,

    /// Blocks an attempt may stay unconfirmed before its gas price is bumped.
    #[arg(env = "ORACLE_NODE_ETH_GAS_BUMP_THRESHOLD", long, default_value = "3")]
    pub eth_gas_bump_threshold: u64,

    #[arg(env = "ORACLE_NODE_ETH_GAS_BUMP_PERCENT", long, default_value = "20")]
    pub eth_gas_bump_percent: u16,

    /// Ceiling (wei) for bumped gas prices.
    #[arg(env = "ORACLE_NODE_ETH_MAX_GAS_PRICE", long, default_value = "1500000000000")]
    pub eth_max_gas_price: u128,

    /// Blocks a receipt needs (including its own) before a tx counts as confirmed.
    #[arg(env = "ORACLE_NODE_MIN_OUTGOING_CONFIRMATIONS", long, default_value = "12")]
    pub min_outgoing_confirmations: u64,

    #[arg(env = "ORACLE_NODE_ETH_GAS_LIMIT", long, default_value = "500000")]
    pub eth_gas_limit: u64,

    /// How often the chain head is polled.
    #[arg(env = "ORACLE_NODE_HEAD_POLL_INTERVAL_SECONDS", long, default_value = "15")]
    pub head_poll_interval_seconds: u64,
}
