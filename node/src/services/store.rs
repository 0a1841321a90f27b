use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::config::Config;
use crate::error::{combine, MultiError};
use crate::services::synchronization::StatsPusher;
use crate::types::key::Key;

/// Owns the lifecycle of the long lived pieces around the database: the
/// tx manager accounts, the persisted keys and the stats pusher.
pub struct Store {
    config: Arc<Config>,
    stats_pusher: Option<Arc<StatsPusher>>,
    closed: AtomicBool,
}

impl Store {
    /// The stats pusher only exists when an explorer is configured.
    pub fn new(config: Arc<Config>) -> Self {
        let stats_pusher = config.params().explorer.clone().map(|explorer| {
            Arc::new(StatsPusher::new(config.database().clone(), explorer, config.sync_notifier().clone()))
        });
        Self { config, stats_pusher, closed: AtomicBool::new(false) }
    }

    pub fn stats_pusher(&self) -> Option<&Arc<StatsPusher>> {
        self.stats_pusher.as_ref()
    }

    /// Registers accounts with the tx manager, persists them and starts the
    /// stats pusher. Every step runs even when an earlier one failed.
    pub async fn start(&self) -> Result<(), MultiError> {
        let mut errors = MultiError::default();

        match self.config.key_store().accounts().await {
            Ok(accounts) => {
                if let Err(err) = self.config.tx_manager().register(accounts).await {
                    errors.extend(err);
                }
            }
            Err(err) => errors.push(err),
        }

        if let Err(err) = self.sync_keys_to_db().await {
            errors.extend(err);
        }

        if let Some(pusher) = &self.stats_pusher {
            if let Err(err) = pusher.start().await {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            info!("Store started");
        }
        errors.into_result()
    }

    /// Stops the stats pusher and closes the database. Only the first call
    /// does anything.
    pub async fn close(&self) -> Result<(), MultiError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Some(pusher) = &self.stats_pusher {
            pusher.close().await;
        }
        let result = combine([self.config.database().disconnect().await]);
        info!("Store closed");
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Makes sure every key store account has a key row.
    pub async fn sync_keys_to_db(&self) -> Result<(), MultiError> {
        let accounts = self.config.key_store().accounts().await.map_err(|err| MultiError(vec![err.into()]))?;

        let mut results = Vec::with_capacity(accounts.len());
        for address in accounts {
            let result = self.config.database().first_or_create_key(Key::new(address)).await.map(|_| ());
            if let Err(err) = &result {
                warn!(%address, error = %err, "Failed to persist key");
            }
            results.push(result);
        }
        combine(results)
    }
}
