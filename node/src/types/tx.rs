use alloy_primitives::{keccak256, Address, Bytes, B256};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One logical on-chain transaction intent. The nonce is assigned once by the
/// tx manager and is shared by every attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tx {
    pub id: Uuid,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub nonce: u64,
    pub gas_limit: u64,
    pub confirmed: bool,
    /// head height when the tx was first created
    pub sent_at: u64,
    pub created_at: DateTime<Utc>,
}

impl Tx {
    pub fn new(from: Address, to: Address, data: Bytes, nonce: u64, gas_limit: u64, sent_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            data,
            nonce,
            gas_limit,
            confirmed: false,
            sent_at,
            created_at: Utc::now().round_subsecs(0),
        }
    }

    /// Bytes handed to the key store for signing. Signing itself is opaque to
    /// the node, so the layout only has to be stable and unique per attempt.
    pub fn signing_payload(&self, gas_price: u128, chain_id: u64) -> Vec<u8> {
        let mut payload = Vec::with_capacity(8 * 3 + 16 + 20 * 2 + self.data.len());
        payload.extend_from_slice(&chain_id.to_be_bytes());
        payload.extend_from_slice(&self.nonce.to_be_bytes());
        payload.extend_from_slice(&gas_price.to_be_bytes());
        payload.extend_from_slice(&self.gas_limit.to_be_bytes());
        payload.extend_from_slice(self.from.as_slice());
        payload.extend_from_slice(self.to.as_slice());
        payload.extend_from_slice(&self.data);
        payload
    }
}

/// One broadcast attempt of a [`Tx`] at a given gas price.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxAttempt {
    pub id: Uuid,
    pub tx_id: Uuid,
    pub hash: B256,
    pub signed_raw: Bytes,
    pub gas_price: u128,
    /// head height at which this attempt was created
    pub sent_at: u64,
    pub confirmed_at: Option<u64>,
    /// false when the broadcast did not reach the chain and must be retried
    pub broadcast: bool,
    pub created_at: DateTime<Utc>,
}

impl TxAttempt {
    pub fn new(tx_id: Uuid, signed_raw: Bytes, gas_price: u128, sent_at: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            tx_id,
            hash: keccak256(&signed_raw),
            signed_raw,
            gas_price,
            sent_at,
            confirmed_at: None,
            broadcast: false,
            created_at: Utc::now(),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }
}

/// The subset of a transaction receipt the node cares about.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_hash: Option<B256>,
    #[serde(with = "crate::utils::quantity")]
    pub block_number: u64,
}
