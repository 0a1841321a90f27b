pub mod run;

use std::fmt;

use thiserror::Error;

use crate::adapters::AdapterError;
use crate::core::client::database::DatabaseError;
use crate::core::client::keystore::KeyStoreError;
use crate::core::client::rpc::RpcError;
use crate::services::external_initiators::ExternalInitiatorError;
use crate::services::synchronization::SyncError;
use crate::services::tx_manager::TxManagerError;
use crate::types::error::TypeError;
pub use run::RunError;

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Setup Command Error: {0}")]
    SetupCommandError(String),

    #[error("Type error: {0}")]
    TypeError(#[from] TypeError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Rpc error: {0}")]
    RpcError(#[from] RpcError),

    #[error("Key store error: {0}")]
    KeyStoreError(#[from] KeyStoreError),

    #[error("Adapter error: {0}")]
    AdapterError(#[from] AdapterError),

    #[error("Tx manager error: {0}")]
    TxManagerError(#[from] TxManagerError),

    #[error("Run error: {0}")]
    RunError(#[from] RunError),

    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),

    #[error("External initiator error: {0}")]
    ExternalInitiatorError(#[from] ExternalInitiatorError),

    #[error("{0}")]
    MultiError(#[from] MultiError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Node Error: {0}")]
    NodeAnyHowError(#[from] anyhow::Error),
}

/// Failures collected by a loop that keeps going after an error. Order is
/// the order in which the failures happened.
#[derive(Debug, Default)]
pub struct MultiError(pub Vec<NodeError>);

impl MultiError {
    pub fn push(&mut self, err: impl Into<NodeError>) {
        self.0.push(err.into());
    }

    /// Takes over the failures of a nested loop, flattened.
    pub fn extend(&mut self, other: MultiError) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s) occurred: ", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Keeps every error of `results`, dropping the successes.
pub fn combine<E: Into<NodeError>>(results: impl IntoIterator<Item = Result<(), E>>) -> Result<(), MultiError> {
    let mut errors = MultiError::default();
    for result in results {
        if let Err(err) = result {
            errors.push(err);
        }
    }
    errors.into_result()
}
