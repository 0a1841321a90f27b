use thiserror::Error;

use crate::core::client::database::DatabaseError;
use crate::services::tx_manager::TxManagerError;

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Adapter not found: {0}")]
    AdapterNotFound(String),

    #[error("Invalid task params: {0}")]
    InvalidParams(String),

    #[error("Invalid task input: {0}")]
    InvalidInput(String),

    #[error("Bridge {name} responded with status {status}")]
    BridgeStatus { name: String, status: u16 },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Tx manager error: {0}")]
    TxManagerError(#[from] TxManagerError),

    #[error("Http error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
