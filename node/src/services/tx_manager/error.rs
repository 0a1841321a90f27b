use alloy_primitives::Address;
use thiserror::Error;
use uuid::Uuid;

use crate::core::client::database::DatabaseError;
use crate::core::client::keystore::KeyStoreError;
use crate::core::client::rpc::RpcError;

#[derive(Error, Debug)]
pub enum TxManagerError {
    #[error("No signing account is registered")]
    NoAccounts,

    #[error("Account {0} is not registered")]
    UnknownAccount(Address),

    #[error("Tx {0} has no attempts")]
    NoAttempts(Uuid),

    #[error("Nonce {nonce} of {address} was already used on chain")]
    NonceTooLow { address: Address, nonce: u64 },

    #[error("Gave up on {address} after reloading its nonce {reloads} times")]
    NonceReloadLimitReached { address: Address, reloads: usize },

    #[error("Rpc error: {0}")]
    RpcError(#[from] RpcError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Key store error: {0}")]
    KeyStoreError(#[from] KeyStoreError),
}
