use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use serde_json::{json, Value};

use super::{RpcCaller, RpcError};
use crate::types::tx::TxReceipt;
use crate::utils::quantity::parse_quantity;

/// Typed view over the handful of `eth_` methods the node needs.
#[derive(Clone)]
pub struct EthClient {
    caller: Arc<dyn RpcCaller>,
}

impl EthClient {
    pub fn new(caller: Arc<dyn RpcCaller>) -> Self {
        Self { caller }
    }

    /// Next nonce of `address`, counting transactions still in the pool.
    pub async fn get_nonce(&self, address: Address) -> Result<u64, RpcError> {
        const METHOD: &str = "eth_getTransactionCount";
        let result = self.caller.call(METHOD, vec![json!(address), json!("pending")]).await?;
        quantity(METHOD, &result)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        const METHOD: &str = "eth_blockNumber";
        let result = self.caller.call(METHOD, vec![]).await?;
        quantity(METHOD, &result)
    }

    pub async fn send_raw_transaction(&self, signed: &Bytes) -> Result<B256, RpcError> {
        const METHOD: &str = "eth_sendRawTransaction";
        let result = self.caller.call(METHOD, vec![json!(signed)]).await?;
        serde_json::from_value(result).map_err(|e| RpcError::invalid_response(METHOD, e))
    }

    /// `None` while the transaction is not mined.
    pub async fn get_transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        const METHOD: &str = "eth_getTransactionReceipt";
        let result = self.caller.call(METHOD, vec![json!(hash)]).await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result).map(Some).map_err(|e| RpcError::invalid_response(METHOD, e))
    }
}

fn quantity(method: &str, value: &Value) -> Result<u64, RpcError> {
    value
        .as_str()
        .ok_or_else(|| RpcError::invalid_response(method, format!("expected a hex quantity, got {value}")))
        .and_then(|raw| parse_quantity(raw).map_err(|e| RpcError::invalid_response(method, e)))
}
