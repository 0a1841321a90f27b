use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::config::Config;
use crate::error::NodeError;
use crate::services::run_executor::RunExecutor;
use crate::utils::ticker::Ticker;

/// Polls the chain head and resumes pending runs whenever it moves.
pub struct HeadTracker {
    config: Arc<Config>,
    executor: Arc<RunExecutor>,
    last_height: Mutex<Option<u64>>,
}

impl HeadTracker {
    pub fn new(config: Arc<Config>, executor: Arc<RunExecutor>) -> Self {
        Self { config, executor, last_height: Mutex::new(None) }
    }

    pub async fn last_height(&self) -> Option<u64> {
        *self.last_height.lock().await
    }

    /// Reads the head once. Returns the new height when it advanced.
    pub async fn on_tick(&self) -> Result<Option<u64>, NodeError> {
        let height = self.config.eth().block_number().await?;

        {
            let mut last = self.last_height.lock().await;
            if last.is_some_and(|last| height <= last) {
                debug!(height, "Head unchanged");
                return Ok(None);
            }
            *last = Some(height);
        }

        info!(height, "New head");
        self.executor.resume_pending_confirmations(height).await?;
        Ok(Some(height))
    }

    pub async fn run(self: Arc<Self>, mut ticker: Ticker, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Head tracker stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.on_tick().await {
                        warn!(error = %err, "Head tracking failed");
                    }
                }
            }
        }
    }
}
