use alloy_primitives::Address;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyStoreError {
    #[error("No key for account {0}")]
    UnknownAccount(Address),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign with {address}: {message}")]
    Signing { address: Address, message: String },
}
