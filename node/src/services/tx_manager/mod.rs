pub mod error;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::client::database::DatabaseClient;
use crate::core::client::keystore::KeyStore;
use crate::core::client::rpc::EthClient;
use crate::error::{combine, MultiError};
use crate::types::pagination::{Page, PageParams};
use crate::types::params::TxManagerParams;
use crate::types::tx::{Tx, TxAttempt, TxReceipt};
pub use error::TxManagerError;

/// How many times a tx may get a fresh nonce after the chain reported its
/// nonce as already used.
pub const NONCE_RELOAD_LIMIT: usize = 3;

/// Outcome of one confirmation check.
#[derive(Debug, Clone, PartialEq)]
pub enum TxConfirmation {
    /// Mined and buried under enough blocks
    Confirmed(TxReceipt),
    /// Not mined yet, or mined but not deep enough. `hash` is the attempt
    /// that is currently authoritative.
    Pending { hash: B256, confirmations: u64 },
}

struct ManagedAccount {
    address: Address,
    /// next nonce to hand out; holding the lock serializes tx creation
    next_nonce: Mutex<u64>,
}

/// Sole owner of Tx and TxAttempt rows: assigns nonces, signs and
/// broadcasts attempts, tracks confirmations and bumps gas.
pub struct EthTxManager {
    eth: EthClient,
    key_store: Arc<dyn KeyStore>,
    database: Arc<dyn DatabaseClient>,
    params: TxManagerParams,
    /// in registration order, the first one is the default sender
    accounts: RwLock<Vec<Arc<ManagedAccount>>>,
}

impl EthTxManager {
    pub fn new(
        eth: EthClient,
        key_store: Arc<dyn KeyStore>,
        database: Arc<dyn DatabaseClient>,
        params: TxManagerParams,
    ) -> Self {
        Self { eth, key_store, database, params, accounts: RwLock::new(Vec::new()) }
    }

    pub fn params(&self) -> &TxManagerParams {
        &self.params
    }

    /// Loads the signing accounts, starting each one at the chain's pending
    /// transaction count. Registering an account again reloads its nonce.
    pub async fn register(&self, addresses: Vec<Address>) -> Result<(), MultiError> {
        let mut results = Vec::with_capacity(addresses.len());
        for address in addresses {
            let result = match self.eth.get_nonce(address).await {
                Ok(nonce) => {
                    let mut accounts = self.accounts.write().await;
                    match accounts.iter().find(|account| account.address == address) {
                        Some(account) => *account.next_nonce.lock().await = nonce,
                        None => accounts.push(Arc::new(ManagedAccount { address, next_nonce: Mutex::new(nonce) })),
                    }
                    info!(log_type = "completed", category = "tx_manager", %address, nonce, "Registered account.");
                    Ok(())
                }
                Err(err) => {
                    warn!(%address, error = %err, "Failed to load nonce of account");
                    Err(TxManagerError::from(err))
                }
            };
            results.push(result);
        }
        combine(results)
    }

    pub async fn default_account(&self) -> Result<Address, TxManagerError> {
        self.accounts.read().await.first().map(|account| account.address).ok_or(TxManagerError::NoAccounts)
    }

    pub async fn next_nonce(&self, address: Address) -> Result<u64, TxManagerError> {
        let account = self.account(address).await?;
        let nonce = *account.next_nonce.lock().await;
        Ok(nonce)
    }

    async fn account(&self, address: Address) -> Result<Arc<ManagedAccount>, TxManagerError> {
        self.accounts
            .read()
            .await
            .iter()
            .find(|account| account.address == address)
            .cloned()
            .ok_or(TxManagerError::UnknownAccount(address))
    }

    /// Creates a tx with the next nonce of `from` and sends its first
    /// attempt at the default gas price. The tx is stored before anything is
    /// broadcast. Calls for the same account are admitted one at a time.
    pub async fn create_tx(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        height: u64,
    ) -> Result<(Tx, TxAttempt), TxManagerError> {
        let account = self.account(from).await?;
        let mut next_nonce = account.next_nonce.lock().await;

        let mut tx =
            self.database.create_tx(Tx::new(from, to, data, *next_nonce, self.params.gas_limit, height)).await?;
        *next_nonce += 1;
        info!(log_type = "starting", category = "tx_manager", tx_id = %tx.id, %from, nonce = tx.nonce, "Created tx.");

        let mut reloads = 0;
        loop {
            match self.add_tx_attempt(&tx, self.params.gas_price_default, height).await {
                Ok(attempt) => return Ok((tx, attempt)),
                Err(TxManagerError::NonceTooLow { .. }) => {
                    if reloads == NONCE_RELOAD_LIMIT {
                        return Err(TxManagerError::NonceReloadLimitReached { address: from, reloads });
                    }
                    reloads += 1;
                    let fresh = self.eth.get_nonce(from).await?;
                    warn!(tx_id = %tx.id, stale = tx.nonce, fresh, "Chain rejected stale nonce, reassigning");
                    tx.nonce = fresh;
                    self.database.save_tx(&tx).await?;
                    *next_nonce = fresh + 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Signs, stores and broadcasts one attempt of `tx`. A broadcast that
    /// does not reach the chain leaves the attempt stored with
    /// `broadcast == false` for a later retry. An attempt rejected for its
    /// nonce is removed again.
    pub async fn add_tx_attempt(&self, tx: &Tx, gas_price: u128, height: u64) -> Result<TxAttempt, TxManagerError> {
        let payload = tx.signing_payload(gas_price, self.params.chain_id);
        let signed = self.key_store.sign(&tx.from, &payload).await?;
        let mut attempt = self.database.create_tx_attempt(TxAttempt::new(tx.id, signed, gas_price, height)).await?;

        match self.eth.send_raw_transaction(&attempt.signed_raw).await {
            Ok(_) => {
                attempt.broadcast = true;
                self.database.save_tx_attempt(&attempt).await?;
                info!(
                    log_type = "completed",
                    category = "tx_manager",
                    tx_id = %tx.id,
                    hash = %attempt.hash,
                    nonce = tx.nonce,
                    gas_price,
                    "Broadcast tx attempt."
                );
            }
            Err(err) if err.is_nonce_too_low() => {
                self.database.delete_tx_attempt(attempt.id).await?;
                return Err(TxManagerError::NonceTooLow { address: tx.from, nonce: tx.nonce });
            }
            Err(err) => {
                warn!(tx_id = %tx.id, hash = %attempt.hash, error = %err, "Broadcast failed, attempt kept for retry");
            }
        }
        Ok(attempt)
    }

    /// Checks every attempt of a tx against the chain at `height`.
    ///
    /// Confirms the tx once a receipt is `min_confirmations` deep. Otherwise
    /// retries a broadcast that never went out, or bumps the gas price once
    /// the latest attempt is older than `gas_bump_threshold` blocks. Bumps
    /// reuse the tx nonce and stop at `max_gas_price`; the tx is never
    /// abandoned. Rpc failures leave the tx pending.
    pub async fn bump_gas_until_safe(&self, tx_id: Uuid, height: u64) -> Result<TxConfirmation, TxManagerError> {
        let mut tx = self.database.find_tx(tx_id).await?;
        let attempts = self.database.tx_attempts_for(tx_id).await?;
        let latest = attempts.first().cloned().ok_or(TxManagerError::NoAttempts(tx_id))?;

        for attempt in &attempts {
            let receipt = match self.eth.get_transaction_receipt(attempt.hash).await {
                Ok(Some(receipt)) => receipt,
                Ok(None) => continue,
                // the chain may know better on the next head, the tx stays tracked
                Err(err) => {
                    warn!(
                        tx_id = %tx.id,
                        hash = %attempt.hash,
                        error = %err,
                        "Receipt lookup failed, tx still pending"
                    );
                    return Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 });
                }
            };
            let confirmations = (height + 1).saturating_sub(receipt.block_number);
            if confirmations < self.params.min_confirmations {
                debug!(tx_id = %tx.id, hash = %attempt.hash, confirmations, "Tx mined, waiting for confirmations");
                return Ok(TxConfirmation::Pending { hash: attempt.hash, confirmations });
            }

            let mut confirmed = attempt.clone();
            confirmed.confirmed_at = Some(height);
            self.database.save_tx_attempt(&confirmed).await?;
            tx.confirmed = true;
            self.database.save_tx(&tx).await?;
            info!(
                log_type = "completed",
                category = "tx_manager",
                tx_id = %tx.id,
                hash = %attempt.hash,
                block_number = receipt.block_number,
                "Tx confirmed."
            );
            return Ok(TxConfirmation::Confirmed(receipt));
        }

        if !latest.broadcast {
            self.rebroadcast(latest.clone()).await?;
            return Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 });
        }

        if height >= latest.sent_at.saturating_add(self.params.gas_bump_threshold) {
            let bumped = self.bumped_gas_price(latest.gas_price);
            if bumped <= latest.gas_price {
                warn!(tx_id = %tx.id, gas_price = latest.gas_price, "Tx at max gas price, not bumping further");
                return Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 });
            }
            info!(tx_id = %tx.id, nonce = tx.nonce, old_gas_price = latest.gas_price, new_gas_price = bumped, "Bumping gas price.");
            return match self.add_tx_attempt(&tx, bumped, height).await {
                Ok(attempt) => Ok(TxConfirmation::Pending { hash: attempt.hash, confirmations: 0 }),
                // an earlier attempt got mined, its receipt shows up on a later check
                Err(TxManagerError::NonceTooLow { .. }) => {
                    Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 })
                }
                Err(TxManagerError::RpcError(err)) => {
                    warn!(tx_id = %tx.id, error = %err, "Gas bump failed, retrying on a later head");
                    Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 })
                }
                Err(err) => Err(err),
            };
        }

        Ok(TxConfirmation::Pending { hash: latest.hash, confirmations: 0 })
    }

    async fn rebroadcast(&self, mut attempt: TxAttempt) -> Result<(), TxManagerError> {
        match self.eth.send_raw_transaction(&attempt.signed_raw).await {
            Ok(_) => {
                attempt.broadcast = true;
                self.database.save_tx_attempt(&attempt).await?;
                info!(tx_id = %attempt.tx_id, hash = %attempt.hash, "Rebroadcast tx attempt.");
            }
            Err(err) => warn!(tx_id = %attempt.tx_id, hash = %attempt.hash, error = %err, "Rebroadcast failed"),
        }
        Ok(())
    }

    fn bumped_gas_price(&self, current: u128) -> u128 {
        let increase = (current.saturating_mul(u128::from(self.params.gas_bump_percent)) / 100).max(1);
        current.saturating_add(increase).min(self.params.max_gas_price)
    }

    /// Attempts of one tx, most recently sent first.
    pub async fn attempts_for(&self, tx_id: Uuid) -> Result<Vec<TxAttempt>, TxManagerError> {
        Ok(self.database.tx_attempts_for(tx_id).await?)
    }

    /// One page of every attempt, most recently sent first.
    pub async fn tx_attempts_page(&self, params: PageParams) -> Result<Page<TxAttempt>, TxManagerError> {
        let (items, total) = self.database.tx_attempts(params.offset(), params.limit()).await?;
        Ok(Page::new(items, total, params))
    }
}
