pub mod error;

use std::collections::BTreeMap;
use std::fmt;

use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

pub use error::KeyStoreError;

/// Source of signing accounts. How keys are stored and how signatures are
/// produced is up to the implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// accounts - Every account this store can sign for
    async fn accounts(&self) -> Result<Vec<Address>, KeyStoreError>;
    /// sign - Signs `payload` with the key of `account`, returning the bytes to broadcast
    async fn sign(&self, account: &Address, payload: &[u8]) -> Result<Bytes, KeyStoreError>;
}

/// Keys held in memory, loaded from hex private keys.
pub struct LocalKeyStore {
    signers: BTreeMap<Address, PrivateKeySigner>,
}

impl LocalKeyStore {
    pub fn from_private_keys(keys: &[String]) -> Result<Self, KeyStoreError> {
        let mut signers = BTreeMap::new();
        for key in keys {
            let signer: PrivateKeySigner =
                key.trim().parse().map_err(|e| KeyStoreError::InvalidKey(format!("{e}")))?;
            signers.insert(signer.address(), signer);
        }
        Ok(Self { signers })
    }
}

impl fmt::Debug for LocalKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // addresses only, never key material
        f.debug_struct("LocalKeyStore").field("accounts", &self.signers.keys().collect::<Vec<_>>()).finish()
    }
}

#[async_trait]
impl KeyStore for LocalKeyStore {
    async fn accounts(&self) -> Result<Vec<Address>, KeyStoreError> {
        Ok(self.signers.keys().copied().collect())
    }

    async fn sign(&self, account: &Address, payload: &[u8]) -> Result<Bytes, KeyStoreError> {
        let signer = self.signers.get(account).ok_or(KeyStoreError::UnknownAccount(*account))?;
        let signature = signer
            .sign_message_sync(payload)
            .map_err(|e| KeyStoreError::Signing { address: *account, message: e.to_string() })?;

        let mut signed = Vec::with_capacity(payload.len() + 65);
        signed.extend_from_slice(payload);
        signed.extend_from_slice(&signature.as_bytes());
        Ok(Bytes::from(signed))
    }
}
