use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::run::RunError;
use crate::types::assets::Link;
use crate::types::job_spec::{Initiator, JobSpec, TaskSpec};
use crate::types::run_result::{RunOutput, RunResult};
use crate::types::status::RunStatus;

/// One adapter invocation within a job run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRun {
    pub id: Uuid,
    pub job_run_id: Uuid,
    pub task_spec: TaskSpec,
    pub status: RunStatus,
    pub result: RunResult,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRun {
    fn new(job_run_id: Uuid, task_spec: TaskSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_run_id,
            task_spec,
            status: RunStatus::Unstarted,
            result: RunResult::default(),
            finished_at: None,
        }
    }

    /// Marks the task as dispatched.
    pub fn start(&mut self) {
        if self.status == RunStatus::Unstarted {
            self.status = RunStatus::InProgress;
        }
    }

    /// Consumes one adapter output. The result of a finished task is never
    /// overwritten.
    pub fn apply_output(&mut self, output: &RunOutput) -> Result<(), RunError> {
        if self.status.is_finished() {
            return Err(RunError::AlreadyFinished { id: self.id, status: self.status });
        }
        self.result = RunResult::from(output);
        self.status = output.status();
        if self.status.is_finished() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    fn cancel(&mut self) {
        if !self.status.is_finished() {
            self.status = RunStatus::Cancelled;
            self.finished_at = Some(Utc::now());
        }
    }
}

/// One execution of a job spec. Owns its task runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: Uuid,
    pub job_spec_id: Uuid,
    pub initiator: Initiator,
    pub status: RunStatus,
    pub task_runs: Vec<TaskRun>,
    pub result: RunResult,
    pub payment: Option<Link>,
    pub creation_height: Option<u64>,
    pub observed_height: Option<u64>,
    /// bumped by the database on every save, used for optimistic locking
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRun {
    pub(crate) fn new(spec: &JobSpec, initiator: &Initiator) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now().round_subsecs(0);
        Self {
            id,
            job_spec_id: spec.id,
            initiator: initiator.clone(),
            status: RunStatus::Unstarted,
            task_runs: spec.tasks.iter().cloned().map(|task| TaskRun::new(id, task)).collect(),
            result: RunResult::default(),
            payment: None,
            creation_height: None,
            observed_height: None,
            version: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Index of the first task run that has not reached a terminal state.
    pub fn current_task_run_index(&self) -> Option<usize> {
        self.task_runs.iter().position(|tr| !tr.status.is_finished())
    }

    pub fn current_task_run(&self) -> Option<&TaskRun> {
        self.current_task_run_index().map(|idx| &self.task_runs[idx])
    }

    pub fn tasks_remain(&self) -> bool {
        self.current_task_run_index().is_some()
    }

    /// Marks the run and its current task as dispatched.
    pub fn start(&mut self) -> Result<(), RunError> {
        if self.status.is_finished() {
            return Err(RunError::AlreadyFinished { id: self.id, status: self.status });
        }
        if let Some(idx) = self.current_task_run_index() {
            self.task_runs[idx].start();
        }
        self.status = RunStatus::InProgress;
        Ok(())
    }

    /// Applies an adapter output to the current task run and derives the run
    /// status from it. An error finishes the run immediately, whatever tasks
    /// are left.
    pub fn apply_output(&mut self, output: RunOutput) -> Result<(), RunError> {
        if self.status.is_finished() {
            return Err(RunError::AlreadyFinished { id: self.id, status: self.status });
        }
        let idx = self.current_task_run_index().ok_or(RunError::NoTaskRemaining { id: self.id })?;
        self.task_runs[idx].apply_output(&output)?;

        match output {
            RunOutput::Error(message) => self.set_error(message),
            RunOutput::Pending(data) => {
                self.result = RunResult::with_data(data);
                self.set_status(RunStatus::PendingConfirmations);
            }
            RunOutput::Complete(data) => {
                self.result = RunResult::with_data(data);
                if self.tasks_remain() {
                    self.set_status(RunStatus::InProgress);
                } else {
                    self.set_status(RunStatus::Completed);
                }
            }
        }
        Ok(())
    }

    /// Errors the run, recording the message on the run result.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.result = RunResult::with_error(message);
        self.set_status(RunStatus::Errored);
    }

    /// Stops the run. Pending runs may be cancelled too; whatever transaction
    /// they were waiting on keeps being tracked but the run is not resumed.
    pub fn cancel(&mut self) -> Result<(), RunError> {
        if self.status.is_finished() {
            return Err(RunError::AlreadyFinished { id: self.id, status: self.status });
        }
        if let Some(idx) = self.current_task_run_index() {
            self.task_runs[idx].cancel();
        }
        self.set_status(RunStatus::Cancelled);
        Ok(())
    }

    fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
        if status.is_finished() {
            self.finished_at = Some(self.updated_at);
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.result.data.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.result.has_error()
    }

    pub fn error_string(&self) -> String {
        self.result.error_message.clone().unwrap_or_default()
    }

    /// Ordered key/value pairs describing the run for log lines.
    pub fn for_logger(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("job", self.job_spec_id.to_string()),
            ("run", self.id.to_string()),
            ("status", self.status.to_string()),
        ];
        if let Some(height) = self.creation_height {
            fields.push(("creation_height", height.to_string()));
        }
        if let Some(height) = self.observed_height {
            fields.push(("observed_height", height.to_string()));
        }
        if self.has_error() {
            fields.push(("job_error", self.error_string()));
        }
        if self.status.is_completed() {
            fields.push(("link_earned", self.payment.unwrap_or_default().to_string()));
        }
        fields
    }
}
