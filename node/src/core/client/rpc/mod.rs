pub mod error;
pub mod eth;
pub mod lazy;

use std::sync::Arc;

use async_trait::async_trait;
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde_json::Value;
use url::Url;

pub use error::RpcError;
pub use eth::EthClient;
pub use lazy::LazyRpcClient;

/// A connected JSON-RPC endpoint. The wire protocol stays behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcCaller: Send + Sync {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// Opens connections for [`LazyRpcClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcDialer: Send + Sync {
    async fn dial(&self, url: &Url) -> Result<Arc<dyn RpcCaller>, RpcError>;
}

/// Dials websocket endpoints with jsonrpsee.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsDialer;

#[async_trait]
impl RpcDialer for WsDialer {
    async fn dial(&self, url: &Url) -> Result<Arc<dyn RpcCaller>, RpcError> {
        let client = WsClientBuilder::default()
            .build(url.as_str())
            .await
            .map_err(|e| RpcError::Dial { url: url.clone(), message: e.to_string() })?;
        Ok(Arc::new(WsCaller { client }))
    }
}

struct WsCaller {
    client: WsClient,
}

#[async_trait]
impl RpcCaller for WsCaller {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let mut array = ArrayParams::new();
        for param in params {
            array.insert(param).map_err(|e| RpcError::Call { method: method.to_string(), message: e.to_string() })?;
        }
        self.client.request::<Value, _>(method, array).await.map_err(|e| match e {
            ClientError::Transport(_) | ClientError::RestartNeeded(_) => {
                RpcError::Transport { method: method.to_string(), message: e.to_string() }
            }
            e => RpcError::Call { method: method.to_string(), message: e.to_string() },
        })
    }
}
