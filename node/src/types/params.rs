use std::time::Duration;

use url::Url;

use crate::cli::RunCmd;
use crate::error::NodeError;
use crate::types::assets::Link;

/// Knobs of the Ethereum transaction manager.
#[derive(Debug, Clone, PartialEq)]
pub struct TxManagerParams {
    pub chain_id: u64,
    pub gas_price_default: u128,
    pub gas_bump_threshold: u64,
    pub gas_bump_percent: u16,
    pub max_gas_price: u128,
    pub min_confirmations: u64,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerParams {
    pub url: Url,
    pub access_key: String,
    pub secret: String,
    pub push_interval: Duration,
}

/// Validated configuration. Nothing below `main` reads the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeParams {
    pub ethereum_url: Url,
    pub max_rpc_calls_per_second: u32,
    pub head_poll_interval: Duration,
    pub tx_manager: TxManagerParams,
    pub minimum_contract_payment: Link,
    pub database_timeout: Duration,
    pub bridge_response_timeout: Duration,
    pub dev: bool,
    pub feature_external_initiators: bool,
    /// `None` disables sync events altogether
    pub explorer: Option<ExplorerParams>,
    pub private_keys: Vec<String>,
}

impl NodeParams {
    pub fn external_sync_enabled(&self) -> bool {
        self.explorer.is_some()
    }

    pub fn external_initiators_enabled(&self) -> bool {
        self.dev || self.feature_external_initiators
    }
}

impl TryFrom<&RunCmd> for NodeParams {
    type Error = NodeError;

    fn try_from(run_cmd: &RunCmd) -> Result<Self, Self::Error> {
        let eth = &run_cmd.ethereum_args;
        if !matches!(eth.ethereum_url.scheme(), "ws" | "wss") {
            return Err(NodeError::SetupCommandError(format!(
                "Ethereum url scheme must be websocket: {}",
                eth.ethereum_url
            )));
        }
        if eth.max_rpc_calls_per_second == 0 {
            return Err(NodeError::SetupCommandError("max_rpc_calls_per_second must be positive".to_string()));
        }
        if eth.eth_gas_price_default > eth.eth_max_gas_price {
            return Err(NodeError::SetupCommandError(
                "eth_gas_price_default must not exceed eth_max_gas_price".to_string(),
            ));
        }

        let minimum_contract_payment = run_cmd.node_args.minimum_contract_payment.parse::<Link>()?;

        // An explorer without a url is the same as no explorer.
        let explorer = run_cmd.explorer_args.explorer_url.clone().map(|url| ExplorerParams {
            url,
            access_key: run_cmd.explorer_args.explorer_access_key.clone(),
            secret: run_cmd.explorer_args.explorer_secret.clone(),
            push_interval: Duration::from_secs(run_cmd.explorer_args.explorer_push_interval_seconds),
        });

        Ok(Self {
            ethereum_url: eth.ethereum_url.clone(),
            max_rpc_calls_per_second: eth.max_rpc_calls_per_second,
            head_poll_interval: Duration::from_secs(eth.head_poll_interval_seconds),
            tx_manager: TxManagerParams {
                chain_id: eth.chain_id,
                gas_price_default: eth.eth_gas_price_default,
                gas_bump_threshold: eth.eth_gas_bump_threshold,
                gas_bump_percent: eth.eth_gas_bump_percent,
                max_gas_price: eth.eth_max_gas_price,
                min_confirmations: eth.min_outgoing_confirmations.max(1),
                gas_limit: eth.eth_gas_limit,
            },
            minimum_contract_payment,
            database_timeout: Duration::from_secs(run_cmd.node_args.database_timeout_seconds),
            bridge_response_timeout: Duration::from_secs(run_cmd.node_args.bridge_response_timeout_seconds),
            dev: run_cmd.node_args.dev,
            feature_external_initiators: run_cmd.node_args.feature_external_initiators,
            explorer,
            private_keys: run_cmd.key_args.private_keys.clone(),
        })
    }
}
