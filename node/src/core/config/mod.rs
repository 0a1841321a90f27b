use std::sync::Arc;

use tokio::sync::Notify;

use crate::core::client::database::{DatabaseClient, InMemoryDatabase};
use crate::core::client::keystore::{KeyStore, LocalKeyStore};
use crate::core::client::rpc::{EthClient, LazyRpcClient, RpcCaller, WsDialer};
use crate::error::{NodeError, NodeResult};
use crate::services::tx_manager::EthTxManager;
use crate::types::params::NodeParams;

/// The node context. Built once in `main` and handed to every service as
/// `Arc<Config>`.
pub struct Config {
    params: NodeParams,
    /// The database client
    database: Arc<dyn DatabaseClient>,
    /// Signing accounts
    key_store: Arc<dyn KeyStore>,
    /// Typed access to the Ethereum node
    eth: EthClient,
    /// The only writer of tx and tx attempt rows
    tx_manager: Arc<EthTxManager>,
    /// Shared client for bridge calls
    http_client: reqwest::Client,
    /// Woken whenever a sync event is written
    sync_notifier: Arc<Notify>,
}

impl Config {
    /// Builds the production clients from validated params. Nothing is
    /// dialed yet: the Ethereum connection is opened on first use.
    pub async fn setup(params: NodeParams) -> NodeResult<Self> {
        let database: Arc<dyn DatabaseClient> = Arc::new(InMemoryDatabase::new(params.database_timeout));
        let key_store: Arc<dyn KeyStore> = Arc::new(LocalKeyStore::from_private_keys(&params.private_keys)?);
        let rpc: Arc<dyn RpcCaller> = Arc::new(LazyRpcClient::new(
            params.ethereum_url.clone(),
            Arc::new(WsDialer),
            params.max_rpc_calls_per_second,
        )?);
        Self::new(params, database, key_store, rpc)
    }

    pub fn new(
        params: NodeParams,
        database: Arc<dyn DatabaseClient>,
        key_store: Arc<dyn KeyStore>,
        rpc: Arc<dyn RpcCaller>,
    ) -> NodeResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(params.bridge_response_timeout)
            .build()
            .map_err(|e| NodeError::SetupCommandError(format!("Failed to build http client: {e}")))?;
        let eth = EthClient::new(rpc);
        let tx_manager =
            Arc::new(EthTxManager::new(eth.clone(), key_store.clone(), database.clone(), params.tx_manager.clone()));

        Ok(Self { params, database, key_store, eth, tx_manager, http_client, sync_notifier: Arc::new(Notify::new()) })
    }

    pub fn params(&self) -> &NodeParams {
        &self.params
    }

    pub fn database(&self) -> &Arc<dyn DatabaseClient> {
        &self.database
    }

    pub fn key_store(&self) -> &Arc<dyn KeyStore> {
        &self.key_store
    }

    pub fn eth(&self) -> &EthClient {
        &self.eth
    }

    pub fn tx_manager(&self) -> &Arc<EthTxManager> {
        &self.tx_manager
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub fn sync_notifier(&self) -> &Arc<Notify> {
        &self.sync_notifier
    }
}
