use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::status::RunStatus;

/// What an adapter hands back after one invocation.
///
/// Data and error are mutually exclusive by construction. A pending output
/// may carry data (e.g. the id of the transaction being confirmed) but that
/// data is not final.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput {
    Complete(Value),
    Pending(Value),
    Error(String),
}

impl RunOutput {
    pub fn complete(data: Value) -> Self {
        RunOutput::Complete(data)
    }

    pub fn pending(data: Value) -> Self {
        RunOutput::Pending(data)
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        RunOutput::Error(err.to_string())
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunOutput::Complete(_) => RunStatus::Completed,
            RunOutput::Pending(_) => RunStatus::PendingConfirmations,
            RunOutput::Error(_) => RunStatus::Errored,
        }
    }

    pub fn has_error(&self) -> bool {
        matches!(self, RunOutput::Error(_))
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            RunOutput::Complete(data) | RunOutput::Pending(data) => Some(data),
            RunOutput::Error(_) => None,
        }
    }
}

/// The persisted outcome of a task run or job run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub data: Option<Value>,
    pub error_message: Option<String>,
}

impl RunResult {
    pub fn with_data(data: Value) -> Self {
        Self { data: Some(data), error_message: None }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self { data: None, error_message: Some(message.into()) }
    }

    pub fn has_error(&self) -> bool {
        self.error_message.is_some()
    }
}

impl From<&RunOutput> for RunResult {
    fn from(output: &RunOutput) -> Self {
        match output {
            RunOutput::Complete(data) | RunOutput::Pending(data) => RunResult::with_data(data.clone()),
            RunOutput::Error(message) => RunResult::with_error(message.clone()),
        }
    }
}

/// Everything an adapter gets to see for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInput {
    pub job_run_id: Uuid,
    pub task_run_id: Uuid,
    /// previous task's output, or this task's own pending output on resumption
    pub data: Value,
    pub status: RunStatus,
    /// latest chain height observed by the node, when known
    pub block_height: Option<u64>,
}

impl RunInput {
    pub fn new(job_run_id: Uuid, task_run_id: Uuid, data: Value, status: RunStatus) -> Self {
        Self { job_run_id, task_run_id, data, status, block_height: None }
    }

    pub fn with_block_height(mut self, block_height: Option<u64>) -> Self {
        self.block_height = block_height;
        self
    }

    pub fn is_resuming(&self) -> bool {
        self.status.is_pending()
    }
}
