use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::adapters::Adapter;
use crate::core::client::database::QueryMode;
use crate::core::config::Config;
use crate::error::{MultiError, RunError};
use crate::types::assets::Link;
use crate::types::job_run::JobRun;
use crate::types::run_result::{RunInput, RunOutput};
use crate::types::status::RunStatus;
use crate::types::sync_event::SyncEvent;
use crate::utils::logging::format_pairs;

/// Drives job runs: dispatches their tasks one after the other, persists
/// every state change and resumes runs waiting on confirmations.
///
/// Work on one run is serialized by a per-run lock; different runs proceed
/// concurrently.
pub struct RunExecutor {
    config: Arc<Config>,
    run_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
    /// latest chain head seen by the head tracker, 0 until the first one
    latest_height: AtomicU64,
}

impl RunExecutor {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config, run_locks: Mutex::new(HashMap::new()), latest_height: AtomicU64::new(0) }
    }

    pub fn latest_height(&self) -> Option<u64> {
        match self.latest_height.load(Ordering::Acquire) {
            0 => None,
            height => Some(height),
        }
    }

    async fn run_lock(&self, run_id: Uuid) -> Arc<Mutex<()>> {
        self.run_locks.lock().await.entry(run_id).or_default().clone()
    }

    /// Forgets the lock of a run that can no longer change. Late callers
    /// holding a clone only find the run finished and leave it untouched.
    async fn release_if_finished(&self, run_id: Uuid, result: &Result<JobRun, RunError>) {
        let finished = match result {
            Ok(run) => run.status.is_finished(),
            Err(RunError::NotRunnable { status, .. }) => status.is_finished(),
            Err(RunError::AlreadyFinished { .. }) => true,
            Err(_) => false,
        };
        if finished {
            self.run_locks.lock().await.remove(&run_id);
        }
    }

    /// Creates and stores an unstarted run of a live job spec. `input` becomes
    /// the input of the first task.
    pub async fn create_run(
        &self,
        job_spec_id: Uuid,
        initiator_id: Uuid,
        input: Value,
        payment: Option<Link>,
    ) -> Result<JobRun, RunError> {
        let spec = match self.config.database().find_job_spec(job_spec_id, QueryMode::Unscoped).await? {
            spec if spec.is_archived() => return Err(RunError::JobSpecArchived(job_spec_id)),
            spec => spec,
        };
        let initiator =
            spec.initiator(initiator_id).ok_or(RunError::InitiatorNotFound { job_spec_id, initiator_id })?;

        let mut run = spec.new_run(initiator);
        run.payment = payment;
        run.creation_height = self.latest_height();
        run.result.data = Some(input);

        if let (Some(min), Some(paid)) = (spec.min_payment, payment) {
            if paid < min {
                run.set_error(format!(
                    "Rejecting job {} with payment {} below job minimum payment {}",
                    spec.id, paid, min
                ));
            }
        }

        let event = self.sync_event_for(&run)?;
        let run = self.config.database().create_job_run(run, event.clone()).await?;
        if event.is_some() {
            self.config.sync_notifier().notify_one();
        }
        info!(fields = %format_pairs(&run.for_logger()), "Created job run.");
        Ok(run)
    }

    /// Executes a run until it finishes or suspends.
    pub async fn execute(&self, run_id: Uuid) -> Result<JobRun, RunError> {
        let result = self.execute_locked(run_id).await;
        self.release_if_finished(run_id, &result).await;
        result
    }

    async fn execute_locked(&self, run_id: Uuid) -> Result<JobRun, RunError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let run = self.config.database().find_job_run(run_id).await?;
        if !run.status.is_runnable() {
            return Err(RunError::NotRunnable { id: run.id, status: run.status });
        }
        self.drive(run).await
    }

    /// Executes a run in the background.
    pub fn spawn(self: &Arc<Self>, run_id: Uuid) -> JoinHandle<Result<JobRun, RunError>> {
        let executor = self.clone();
        tokio::spawn(async move {
            let result = executor.execute(run_id).await;
            if let Err(err) = &result {
                error!(run_id = %run_id, error = %err, "Job run execution failed");
            }
            result
        })
    }

    /// Re-applies every run waiting on confirmations at the new head.
    pub async fn resume_pending_confirmations(&self, height: u64) -> Result<(), MultiError> {
        self.latest_height.fetch_max(height, Ordering::AcqRel);
        let runs = self
            .config
            .database()
            .job_runs_with_status(vec![RunStatus::PendingConfirmations])
            .await
            .map_err(|err| MultiError(vec![err.into()]))?;

        let resumed = futures::future::join_all(runs.iter().map(|run| self.resume(run.id, height))).await;
        let mut errors = MultiError::default();
        for (run, result) in runs.iter().zip(resumed) {
            if let Err(err) = result {
                warn!(run_id = %run.id, error = %err, "Failed to resume pending run");
                errors.push(err);
            }
        }
        errors.into_result()
    }

    async fn resume(&self, run_id: Uuid, height: u64) -> Result<JobRun, RunError> {
        let result = self.resume_locked(run_id, height).await;
        self.release_if_finished(run_id, &result).await;
        result
    }

    async fn resume_locked(&self, run_id: Uuid, height: u64) -> Result<JobRun, RunError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut run = self.config.database().find_job_run(run_id).await?;
        // cancelled or finished since it was listed
        if !run.status.is_pending() {
            return Ok(run);
        }
        run.observed_height = Some(height);
        self.drive(run).await
    }

    /// Stops a run that has not finished yet, pending ones included.
    pub async fn cancel(&self, run_id: Uuid) -> Result<JobRun, RunError> {
        let result = self.cancel_locked(run_id).await;
        self.release_if_finished(run_id, &result).await;
        result
    }

    async fn cancel_locked(&self, run_id: Uuid) -> Result<JobRun, RunError> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut run = self.config.database().find_job_run(run_id).await?;
        let before = run.status;
        run.cancel()?;
        self.persist(run, before).await
    }

    /// Caller holds the run lock.
    async fn drive(&self, mut run: JobRun) -> Result<JobRun, RunError> {
        loop {
            if run.status == RunStatus::Unstarted {
                let before = run.status;
                run.start()?;
                run = self.persist(run, before).await?;
            }

            let idx = run.current_task_run_index().ok_or(RunError::NoTaskRemaining { id: run.id })?;
            let task_run = &run.task_runs[idx];
            let input = RunInput::new(
                run.id,
                task_run.id,
                run.data().cloned().unwrap_or_else(|| json!({})),
                task_run.status,
            )
            .with_block_height(run.observed_height.or(self.latest_height()));

            let output = self.perform_task(&run, idx, &input).await;
            let before = run.status;
            run.apply_output(output)?;
            run = self.persist(run, before).await?;

            if run.status != RunStatus::InProgress {
                return Ok(run);
            }
        }
    }

    async fn perform_task(&self, run: &JobRun, idx: usize, input: &RunInput) -> RunOutput {
        let task_spec = &run.task_runs[idx].task_spec;
        let adapter =
            match Adapter::resolve(&task_spec.task_type, self.config.params(), self.config.database().as_ref()).await {
                Ok(adapter) => adapter,
                Err(err) => return RunOutput::error(err),
            };

        let minimum = adapter.minimum_contract_payment();
        if let Some(payment) = run.payment {
            if payment < minimum {
                return RunOutput::error(format!(
                    "Rejecting job {} with payment {} below minimum contract payment {}",
                    run.job_spec_id, payment, minimum
                ));
            }
        }

        match AssertUnwindSafe(adapter.perform(&task_spec.params, input, &self.config)).catch_unwind().await {
            Ok(output) => output,
            Err(panic) => {
                let msg = extract_panic_message(&panic);
                error!(run_id = %run.id, task_run_id = %input.task_run_id, "Adapter panicked: {}", msg);
                RunOutput::error(format!("Panic: {}", msg))
            }
        }
    }

    /// Saves a run mutation, with its sync event in the same write.
    async fn persist(&self, run: JobRun, before: RunStatus) -> Result<JobRun, RunError> {
        // re-checking a pending run that is still pending is not news
        let changed = before != run.status || !run.status.is_pending();
        let event = if changed { self.sync_event_for(&run)? } else { None };

        let saved = self.config.database().save_job_run(&run, event.clone()).await?;
        if event.is_some() {
            self.config.sync_notifier().notify_one();
        }
        if changed {
            info!(fields = %format_pairs(&saved.for_logger()), "Job run updated.");
        }
        Ok(saved)
    }

    fn sync_event_for(&self, run: &JobRun) -> Result<Option<SyncEvent>, RunError> {
        if !self.config.params().external_sync_enabled() {
            return Ok(None);
        }
        Ok(Some(SyncEvent::for_run(run)?))
    }
}

fn extract_panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<String>()
        .map(|s| s.as_str())
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("Unknown panic")
        .to_string()
}
