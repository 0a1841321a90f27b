use thiserror::Error;

use crate::core::client::database::DatabaseError;

#[derive(Error, Debug)]
pub enum ExternalInitiatorError {
    #[error("The External Initiator feature is disabled by configuration")]
    FeatureDisabled,

    #[error("External Initiators are currently under development and not yet usable outside of development mode")]
    DevModeOnly,

    #[error("Invalid external initiator name: {0:?}")]
    InvalidName(String),

    #[error("Invalid external initiator url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("External initiator name {0} is taken")]
    NameTaken(String),

    #[error("External initiator not found: {0}")]
    NotFound(String),

    #[error("Invalid external initiator credentials")]
    Unauthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}
