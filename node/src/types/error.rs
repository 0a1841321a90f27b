use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum TypeError {
    #[error("Task type must be non-empty and only contain alphanumerics, '-' or '_': {0:?}")]
    InvalidTaskType(String),

    #[error("A job spec needs at least one task")]
    EmptyJobSpec,

    #[error("A job spec needs at least one initiator")]
    NoInitiators,

    #[error("Invalid link amount: {0}")]
    InvalidLinkAmount(String),

    #[error("Invalid pagination parameter {param}: {value:?}")]
    InvalidPagination { param: &'static str, value: String },
}
