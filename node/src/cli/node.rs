use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct NodeCliArgs {
    /// Floor (juels) for the payment of any run, unless an adapter overrides it.
    #[arg(env = "ORACLE_NODE_MINIMUM_CONTRACT_PAYMENT", long, default_value = "1000000000000000000")]
    pub minimum_contract_payment: String,

    /// Upper bound on a single database operation.
    #[arg(env = "ORACLE_NODE_DATABASE_TIMEOUT_SECONDS", long, default_value = "5")]
    pub database_timeout_seconds: u64,

    #[arg(env = "ORACLE_NODE_BRIDGE_RESPONSE_TIMEOUT_SECONDS", long, default_value = "30")]
    pub bridge_response_timeout_seconds: u64,

    /// Development mode: enables destructive admin operations.
    #[arg(env = "ORACLE_NODE_DEV", long, default_value = "false")]
    pub dev: bool,

    #[arg(env = "ORACLE_NODE_FEATURE_EXTERNAL_INITIATORS", long, default_value = "false")]
    pub feature_external_initiators: bool,
}
