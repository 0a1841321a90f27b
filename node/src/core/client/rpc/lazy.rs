use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde_json::Value;
use tokio::sync::RwLock;
use url::Url;

use super::{RpcCaller, RpcDialer, RpcError};

/// Default ceiling for waiting on the rate limiter and for a single call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// An RPC endpoint that is dialed on first use and throttled on every call.
///
/// Callers first check the `initialized` flag, and only on a miss take the
/// write side of `connection` and dial if nobody did in the meantime. A
/// failed dial leaves the client uninitialized, so the next call dials
/// again. A call that loses the connection drops it, and the next call
/// redials.
pub struct LazyRpcClient {
    url: Url,
    dialer: Arc<dyn RpcDialer>,
    initialized: AtomicBool,
    connection: RwLock<Option<Arc<dyn RpcCaller>>>,
    limiter: DefaultDirectRateLimiter,
    limiter_timeout: Duration,
    call_timeout: Duration,
}

impl LazyRpcClient {
    pub fn new(url: Url, dialer: Arc<dyn RpcDialer>, max_calls_per_second: u32) -> Result<Self, RpcError> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RpcError::InvalidScheme(url));
        }
        let rate = NonZeroU32::new(max_calls_per_second).ok_or(RpcError::InvalidRateLimit)?;
        // burst of one, calls are spread evenly over the second
        let limiter = RateLimiter::direct(Quota::per_second(rate).allow_burst(NonZeroU32::MIN));

        Ok(Self {
            url,
            dialer,
            initialized: AtomicBool::new(false),
            connection: RwLock::new(None),
            limiter,
            limiter_timeout: DEFAULT_RPC_TIMEOUT,
            call_timeout: DEFAULT_RPC_TIMEOUT,
        })
    }

    pub fn with_limiter_timeout(mut self, timeout: Duration) -> Self {
        self.limiter_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_connected(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    async fn connection(&self) -> Result<Arc<dyn RpcCaller>, RpcError> {
        if self.initialized.load(Ordering::Acquire) {
            if let Some(connection) = self.connection.read().await.as_ref() {
                return Ok(connection.clone());
            }
        }

        let mut slot = self.connection.write().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        tracing::debug!(url = %self.url, "Dialing rpc endpoint");
        let connection = self.dialer.dial(&self.url).await?;
        *slot = Some(connection.clone());
        self.initialized.store(true, Ordering::Release);
        tracing::info!(url = %self.url, "Connected to rpc endpoint");
        Ok(connection)
    }

    /// Drops `stale` unless another caller already replaced it.
    async fn reset(&self, stale: &Arc<dyn RpcCaller>) {
        let mut slot = self.connection.write().await;
        let same = slot
            .as_ref()
            .is_some_and(|current| Arc::as_ptr(current) as *const () == Arc::as_ptr(stale) as *const ());
        if same {
            *slot = None;
            self.initialized.store(false, Ordering::Release);
            tracing::warn!(url = %self.url, "Rpc connection lost, redialing on next call");
        }
    }
}

impl fmt::Debug for LazyRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyRpcClient")
            .field("url", &self.url.as_str())
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl RpcCaller for LazyRpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        tokio::time::timeout(self.limiter_timeout, self.limiter.until_ready())
            .await
            .map_err(|_| RpcError::RateLimitTimeout(self.limiter_timeout))?;

        let connection = self.connection().await?;
        let result = tokio::time::timeout(self.call_timeout, connection.call(method, params))
            .await
            .map_err(|_| RpcError::Timeout { method: method.to_string(), timeout: self.call_timeout })?;
        if let Err(RpcError::Transport { .. }) = &result {
            self.reset(&connection).await;
        }
        result
    }
}
