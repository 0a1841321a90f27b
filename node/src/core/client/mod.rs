// Client abstractions module - contains all client interface traits

pub mod database;
pub mod keystore;
pub mod rpc;

pub use database::{DatabaseClient, InMemoryDatabase};
pub use keystore::{KeyStore, LocalKeyStore};
pub use rpc::{EthClient, LazyRpcClient, RpcCaller};
