pub mod explorer;

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use rstest::*;
use serde_json::{json, Value};
use url::Url;

use crate::core::client::database::{DatabaseClient, InMemoryDatabase};
use crate::core::client::keystore::{KeyStore, LocalKeyStore};
use crate::core::client::rpc::{RpcCaller, RpcError};
use crate::core::config::Config;
use crate::types::assets::Link;
use crate::types::job_spec::{InitiatorType, JobSpec, TaskSpec, TaskType};
use crate::types::params::{NodeParams, TxManagerParams};
use crate::utils::quantity::to_quantity;

/// First anvil development key.
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const GAS_PRICE_DEFAULT: u128 = 20_000_000_000;
pub const MIN_CONFIRMATIONS: u64 = 12;
pub const GAS_BUMP_THRESHOLD: u64 = 3;
pub const MIN_CONTRACT_PAYMENT: Link = Link::from_juels(100);
/// Head reported by [`EthMock::with_healthy_chain`].
pub const CHAIN_HEAD: u64 = 5;

#[derive(Clone, Debug)]
enum Reply {
    Ok(Value),
    Err(String),
}

impl Reply {
    fn into_result(self, method: &str) -> Result<Value, RpcError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Err(message) => Err(RpcError::Call { method: method.to_string(), message }),
        }
    }
}

/// Scripted JSON-RPC endpoint. Queued replies are used first, in order; once
/// a method's queue is empty its sticky reply answers every call.
#[derive(Default)]
pub struct EthMock {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
}

impl EthMock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, method: &str, value: Value) -> &Self {
        self.queued.lock().unwrap().entry(method.to_string()).or_default().push_back(Reply::Ok(value));
        self
    }

    pub fn push_error(&self, method: &str, message: &str) -> &Self {
        self.queued.lock().unwrap().entry(method.to_string()).or_default().push_back(Reply::Err(message.to_string()));
        self
    }

    pub fn register(&self, method: &str, value: Value) -> &Self {
        self.sticky.lock().unwrap().insert(method.to_string(), Reply::Ok(value));
        self
    }

    pub fn register_error(&self, method: &str, message: &str) -> &Self {
        self.sticky.lock().unwrap().insert(method.to_string(), Reply::Err(message.to_string()));
        self
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|m| m.as_str() == method).count()
    }

    /// Head, nonce, broadcast and "not mined yet" replies for a healthy chain.
    pub fn with_healthy_chain(&self, nonce: u64) -> &Self {
        self.register("eth_blockNumber", json!(to_quantity(CHAIN_HEAD)))
            .register("eth_getTransactionCount", json!(to_quantity(nonce)))
            .register("eth_sendRawTransaction", json!(B256::repeat_byte(0xee)))
            .register("eth_getTransactionReceipt", Value::Null)
    }
}

#[async_trait]
impl RpcCaller for EthMock {
    async fn call(&self, method: &str, _params: Vec<Value>) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push(method.to_string());
        let queued = self.queued.lock().unwrap().get_mut(method).and_then(|queue| queue.pop_front());
        let reply = queued.or_else(|| self.sticky.lock().unwrap().get(method).cloned());
        match reply {
            Some(reply) => reply.into_result(method),
            None => Err(RpcError::Call { method: method.to_string(), message: "no scripted reply".to_string() }),
        }
    }
}

pub fn receipt(hash: B256, block_number: u64) -> Value {
    json!({
        "transactionHash": hash,
        "blockHash": B256::repeat_byte(0xbb),
        "blockNumber": to_quantity(block_number),
    })
}

#[fixture]
pub fn default_params() -> NodeParams {
    NodeParams {
        ethereum_url: Url::parse("ws://localhost:8546").unwrap(),
        max_rpc_calls_per_second: 500,
        head_poll_interval: Duration::from_secs(15),
        tx_manager: TxManagerParams {
            chain_id: 1,
            gas_price_default: GAS_PRICE_DEFAULT,
            gas_bump_threshold: GAS_BUMP_THRESHOLD,
            gas_bump_percent: 20,
            max_gas_price: 1_500_000_000_000,
            min_confirmations: MIN_CONFIRMATIONS,
            gas_limit: 500_000,
        },
        minimum_contract_payment: MIN_CONTRACT_PAYMENT,
        database_timeout: Duration::from_secs(5),
        bridge_response_timeout: Duration::from_secs(5),
        dev: true,
        feature_external_initiators: false,
        explorer: None,
        private_keys: vec![DEV_KEY.to_string()],
    }
}

pub struct TestNode {
    pub config: Arc<Config>,
    pub eth: Arc<EthMock>,
    pub database: Arc<dyn DatabaseClient>,
}

pub struct TestConfigBuilder {
    params: NodeParams,
    database: Option<Arc<dyn DatabaseClient>>,
    key_store: Option<Arc<dyn KeyStore>>,
    eth: Arc<EthMock>,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self { params: default_params(), database: None, key_store: None, eth: EthMock::new() }
    }

    pub fn configure_params(mut self, configure: impl FnOnce(&mut NodeParams)) -> Self {
        configure(&mut self.params);
        self
    }

    pub fn configure_database(mut self, database: Arc<dyn DatabaseClient>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn configure_key_store(mut self, key_store: Arc<dyn KeyStore>) -> Self {
        self.key_store = Some(key_store);
        self
    }

    pub fn build(self) -> TestNode {
        let database = self
            .database
            .unwrap_or_else(|| Arc::new(InMemoryDatabase::new(self.params.database_timeout)) as Arc<dyn DatabaseClient>);
        let key_store = self.key_store.unwrap_or_else(|| {
            Arc::new(LocalKeyStore::from_private_keys(&self.params.private_keys).unwrap()) as Arc<dyn KeyStore>
        });
        let config =
            Config::new(self.params, database.clone(), key_store, self.eth.clone() as Arc<dyn RpcCaller>).unwrap();
        TestNode { config: Arc::new(config), eth: self.eth, database }
    }
}

impl TestNode {
    /// Registers the key store accounts with the tx manager and returns the
    /// default sender.
    pub async fn register_accounts(&self) -> Address {
        let accounts = self.config.key_store().accounts().await.unwrap();
        self.config.tx_manager().register(accounts).await.unwrap();
        self.config.tx_manager().default_account().await.unwrap()
    }

    /// Stores a spec with a web initiator running `tasks` in order.
    pub async fn create_job(&self, tasks: &[(&str, Value)]) -> JobSpec {
        let tasks = tasks.iter().map(|(name, params)| TaskSpec::new(TaskType::new(name).unwrap(), params.clone())).collect();
        let job = JobSpec::new(vec![(InitiatorType::Web, json!({}))], tasks).unwrap();
        self.database.create_job_spec(job).await.unwrap()
    }
}

/// Polls `check` until it holds or two seconds passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
