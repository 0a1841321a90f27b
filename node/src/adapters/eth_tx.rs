use alloy_primitives::{Address, Bytes};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use super::AdapterError;
use crate::core::config::Config;
use crate::services::tx_manager::TxConfirmation;
use crate::types::run_result::{RunInput, RunOutput};
use crate::utils::json::merge;

/// Task params of an `ethtx` task.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EthTxParams {
    pub address: Address,
    #[serde(default)]
    pub function_selector: Option<Bytes>,
    #[serde(default)]
    pub data_prefix: Option<Bytes>,
}

/// Sends the previous task's `result` to a contract. The first invocation
/// creates the tx and leaves the task pending; every resumption checks the
/// tx (bumping gas when needed) until it is confirmed.
///
/// Without a known chain head nothing is sent yet: the task stays pending and
/// the tx is created on the next head.
pub(super) async fn perform(params: &Value, input: &RunInput, config: &Config) -> Result<RunOutput, AdapterError> {
    let tx_id = input.data.get("txId").and_then(|id| serde_json::from_value::<Uuid>(id.clone()).ok());
    if let (true, Some(tx_id)) = (input.is_resuming(), tx_id) {
        return match current_height(input, config).await {
            Some(height) => ensure_confirmed(tx_id, height, input, config).await,
            None => Ok(RunOutput::pending(input.data.clone())),
        };
    }

    let params: EthTxParams =
        serde_json::from_value(params.clone()).map_err(|e| AdapterError::InvalidParams(e.to_string()))?;
    let data = encode_call(&params, input.data.get("result"))?;

    let Some(height) = current_height(input, config).await else {
        // a txId passed on by an earlier task is not ours
        return Ok(RunOutput::pending(merge(&input.data, &json!({"txId": null}))));
    };
    let tx_manager = config.tx_manager();
    let from = tx_manager.default_account().await?;
    let (tx, attempt) = tx_manager.create_tx(from, params.address, data, height).await?;

    Ok(RunOutput::pending(merge(&input.data, &json!({"result": attempt.hash, "txId": tx.id}))))
}

/// The height the executor observed, else the chain head.
async fn current_height(input: &RunInput, config: &Config) -> Option<u64> {
    if let Some(height) = input.block_height {
        return Some(height);
    }
    match config.eth().block_number().await {
        Ok(height) => Some(height),
        Err(err) => {
            warn!(task_run_id = %input.task_run_id, error = %err, "Chain head unknown, ethtx task stays pending");
            None
        }
    }
}

async fn ensure_confirmed(
    tx_id: Uuid,
    height: u64,
    input: &RunInput,
    config: &Config,
) -> Result<RunOutput, AdapterError> {
    match config.tx_manager().bump_gas_until_safe(tx_id, height).await? {
        TxConfirmation::Confirmed(receipt) => {
            Ok(RunOutput::complete(merge(&input.data, &json!({"result": receipt.transaction_hash}))))
        }
        TxConfirmation::Pending { hash, .. } => Ok(RunOutput::pending(merge(&input.data, &json!({"result": hash})))),
    }
}

/// `functionSelector ++ dataPrefix ++ word(result)`.
pub fn encode_call(params: &EthTxParams, result: Option<&Value>) -> Result<Bytes, AdapterError> {
    let mut data = Vec::new();
    if let Some(selector) = &params.function_selector {
        data.extend_from_slice(selector);
    }
    if let Some(prefix) = &params.data_prefix {
        data.extend_from_slice(prefix);
    }
    if let Some(word) = result.map(evm_word).transpose()?.flatten() {
        data.extend_from_slice(&word);
    }
    Ok(Bytes::from(data))
}

/// One 32 byte EVM word. Hex strings and numbers are left padded, other
/// strings are right padded.
fn evm_word(value: &Value) -> Result<Option<[u8; 32]>, AdapterError> {
    let mut word = [0u8; 32];
    match value {
        Value::Null => return Ok(None),
        Value::Bool(flag) => word[31] = u8::from(*flag),
        Value::Number(number) => {
            let n = number
                .as_u64()
                .ok_or_else(|| AdapterError::InvalidInput(format!("{number} is not an unsigned integer")))?;
            word[24..].copy_from_slice(&n.to_be_bytes());
        }
        Value::String(s) if s.starts_with("0x") => {
            let bytes = hex::decode(&s[2..]).map_err(|e| AdapterError::InvalidInput(format!("{s}: {e}")))?;
            if bytes.len() > 32 {
                return Err(AdapterError::InvalidInput(format!("{s} does not fit in 32 bytes")));
            }
            word[32 - bytes.len()..].copy_from_slice(&bytes);
        }
        Value::String(s) => {
            if s.len() > 32 {
                return Err(AdapterError::InvalidInput(format!("{s:?} does not fit in 32 bytes")));
            }
            word[..s.len()].copy_from_slice(s.as_bytes());
        }
        other => return Err(AdapterError::InvalidInput(format!("cannot encode {other} as a word"))),
    }
    Ok(Some(word))
}
