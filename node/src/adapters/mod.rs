pub mod bridge;
pub mod error;
pub mod eth_tx;

use serde_json::Value;
use tracing::warn;

use crate::core::client::database::DatabaseClient;
use crate::core::config::Config;
use crate::types::assets::Link;
use crate::types::job_spec::TaskType;
use crate::types::params::NodeParams;
use crate::types::run_result::{RunInput, RunOutput};
pub use bridge::Bridge;
pub use error::AdapterError;

/// Every kind of work a task can do. Built-ins are matched by name, any
/// other name must be a registered bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum Adapter {
    /// Passes its input through unchanged
    NoOp,
    /// Never finishes: always reports pending
    NoOpPend,
    /// Sends a contract call through the tx manager
    EthTx { min_payment: Link },
    /// Calls an external HTTP adapter
    Bridge(Bridge),
}

impl Adapter {
    /// Maps a task type to its adapter. Names are compared case-insensitively
    /// (task types are stored lower-cased).
    pub async fn resolve(
        task_type: &TaskType,
        params: &NodeParams,
        database: &dyn DatabaseClient,
    ) -> Result<Adapter, AdapterError> {
        match task_type.as_str() {
            "noop" => Ok(Adapter::NoOp),
            "nooppend" => Ok(Adapter::NoOpPend),
            "ethtx" => Ok(Adapter::EthTx { min_payment: params.minimum_contract_payment }),
            _ => match database.find_bridge(task_type).await {
                Ok(bridge_type) => {
                    let min_payment = bridge_type.minimum_contract_payment.unwrap_or(params.minimum_contract_payment);
                    Ok(Adapter::Bridge(Bridge { bridge_type, min_payment }))
                }
                Err(err) if err.is_not_found() => Err(AdapterError::AdapterNotFound(task_type.to_string())),
                Err(err) => Err(err.into()),
            },
        }
    }

    /// Smallest payment a run must carry for this adapter to be invoked.
    pub fn minimum_contract_payment(&self) -> Link {
        match self {
            Adapter::NoOp | Adapter::NoOpPend => Link::ZERO,
            Adapter::EthTx { min_payment } => *min_payment,
            Adapter::Bridge(bridge) => bridge.min_payment,
        }
    }

    /// Runs the adapter once. Failures come back as an error output, never
    /// as an `Err`.
    pub async fn perform(&self, task_params: &Value, input: &RunInput, config: &Config) -> RunOutput {
        let result = match self {
            Adapter::NoOp => Ok(RunOutput::complete(input.data.clone())),
            Adapter::NoOpPend => Ok(RunOutput::pending(input.data.clone())),
            Adapter::EthTx { .. } => eth_tx::perform(task_params, input, config).await,
            Adapter::Bridge(bridge) => bridge.perform(input, config).await,
        };
        result.unwrap_or_else(|err| {
            warn!(run_id = %input.job_run_id, task_run_id = %input.task_run_id, error = %err, "Adapter failed");
            RunOutput::error(err)
        })
    }
}
