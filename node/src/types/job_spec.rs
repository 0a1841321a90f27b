use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::assets::Link;
use crate::types::error::TypeError;
use crate::types::job_run::JobRun;

/// Name of an adapter kind. Names are case-insensitive, so they are stored
/// lower-cased: `rideShare`, `rideshare` and `RIDESHARE` are the same type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct TaskType(String);

impl TaskType {
    pub fn new(name: &str) -> Result<Self, TypeError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(TypeError::InvalidTaskType(name.to_string()));
        }
        Ok(TaskType(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::new(s)
    }
}

impl TryFrom<String> for TaskType {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TaskType::new(&value)
    }
}

impl From<TaskType> for String {
    fn from(value: TaskType) -> Self {
        value.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskSpec {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// adapter specific parameters, e.g. `address` for `ethtx`
    #[serde(default)]
    pub params: Value,
}

impl TaskSpec {
    pub fn new(task_type: TaskType, params: Value) -> Self {
        Self { id: Uuid::new_v4(), task_type, params }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InitiatorType {
    Web,
    Cron,
    RunLog,
    EthLog,
    RunAt,
    External,
}

/// What triggers runs of a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Initiator {
    pub id: Uuid,
    pub job_spec_id: Uuid,
    #[serde(rename = "type")]
    pub kind: InitiatorType,
    #[serde(default)]
    pub params: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub id: Uuid,
    pub initiators: Vec<Initiator>,
    pub tasks: Vec<TaskSpec>,
    pub min_payment: Option<Link>,
    pub created_at: DateTime<Utc>,
    /// soft delete marker; archived specs are only visible to unscoped queries
    pub deleted_at: Option<DateTime<Utc>>,
}

impl JobSpec {
    /// Builds a spec from initiator kinds and tasks. The task list is fixed
    /// from here on: nothing in the crate hands out a mutable view of it.
    pub fn new(initiators: Vec<(InitiatorType, Value)>, tasks: Vec<TaskSpec>) -> Result<Self, TypeError> {
        if tasks.is_empty() {
            return Err(TypeError::EmptyJobSpec);
        }
        if initiators.is_empty() {
            return Err(TypeError::NoInitiators);
        }
        let id = Uuid::new_v4();
        let initiators = initiators
            .into_iter()
            .map(|(kind, params)| Initiator { id: Uuid::new_v4(), job_spec_id: id, kind, params })
            .collect();
        Ok(Self { id, initiators, tasks, min_payment: None, created_at: Utc::now().round_subsecs(0), deleted_at: None })
    }

    pub fn with_min_payment(mut self, min_payment: Link) -> Self {
        self.min_payment = Some(min_payment);
        self
    }

    pub fn initiator(&self, id: Uuid) -> Option<&Initiator> {
        self.initiators.iter().find(|i| i.id == id)
    }

    pub fn is_archived(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// A fresh run with one unstarted task run per task, in spec order.
    pub fn new_run(&self, initiator: &Initiator) -> JobRun {
        JobRun::new(self, initiator)
    }
}
