use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatabaseError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Record {id} was modified concurrently (expected version {expected}, found {found})")]
    Conflict { id: Uuid, expected: i32, found: i32 },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),
}

impl DatabaseError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        DatabaseError::NotFound { kind, id: id.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound { .. })
    }
}
