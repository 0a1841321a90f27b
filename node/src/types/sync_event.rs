use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::job_run::JobRun;

/// A serialized run snapshot queued for delivery to the explorer. Rows are
/// only removed once the explorer acknowledged them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncEvent {
    /// assigned by the database on insert, increasing in creation order
    pub id: u64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl SyncEvent {
    pub fn for_run(run: &JobRun) -> Result<Self, serde_json::Error> {
        Ok(Self { id: 0, body: serde_json::to_string(&sync_body(run))?, created_at: Utc::now() })
    }
}

/// The explorer facing presentation of a run.
pub fn sync_body(run: &JobRun) -> Value {
    let tasks: Vec<Value> = run
        .task_runs
        .iter()
        .enumerate()
        .map(|(index, tr)| {
            json!({
                "index": index,
                "type": tr.task_spec.task_type,
                "status": tr.status,
                "error": tr.result.error_message,
                "result": tr.result.data,
            })
        })
        .collect();

    json!({
        "id": run.id,
        "runId": run.id,
        "jobId": run.job_spec_id,
        "status": run.status,
        "error": run.result.error_message,
        "createdAt": run.created_at,
        "finishedAt": run.finished_at,
        "payment": run.payment,
        "result": run.result.data,
        "tasks": tasks,
    })
}
