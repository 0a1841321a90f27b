use serde::{Deserialize, Serialize};

/// Lifecycle of a job run and of each of its task runs.
///
/// `Completed`, `Errored` and `Cancelled` are terminal. `PendingConfirmations`
/// is the only state a run may leave and re-enter (it oscillates with
/// `InProgress` while a chain transaction matures).
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, strum_macros::Display, strum_macros::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    /// Created, nothing has been dispatched yet
    #[default]
    Unstarted,
    /// A task is being executed or the next one is about to be
    InProgress,
    /// Suspended until an outside trigger (a new chain head) re-applies output
    PendingConfirmations,
    /// Every task finished successfully
    Completed,
    /// A task failed; no further task was executed
    Errored,
    /// Stopped from the outside before finishing
    Cancelled,
}

impl RunStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Errored | RunStatus::Cancelled)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RunStatus::PendingConfirmations)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, RunStatus::Errored)
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, RunStatus::Unstarted | RunStatus::InProgress)
    }
}
