use thiserror::Error;
use uuid::Uuid;

use crate::core::client::database::DatabaseError;
use crate::types::status::RunStatus;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Run {id} is already {status}")]
    AlreadyFinished { id: Uuid, status: RunStatus },

    #[error("Run {id} has no task left to execute")]
    NoTaskRemaining { id: Uuid },

    #[error("Run {id} cannot be executed while {status}")]
    NotRunnable { id: Uuid, status: RunStatus },

    #[error("Job spec {0} is archived")]
    JobSpecArchived(Uuid),

    #[error("Initiator {initiator_id} does not belong to job spec {job_spec_id}")]
    InitiatorNotFound { job_spec_id: Uuid, initiator_id: Uuid },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),

    #[error("Failed to serialize run: {0}")]
    SerializationError(#[from] serde_json::Error),
}
