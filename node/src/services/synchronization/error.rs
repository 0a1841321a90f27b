use std::time::Duration;

use thiserror::Error;

use crate::core::client::database::DatabaseError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Failed to connect to explorer {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Invalid explorer credential header: {0}")]
    InvalidHeader(String),

    #[error("Explorer connection failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Explorer closed the connection")]
    ConnectionClosed,

    #[error("No acknowledgement from explorer within {0:?}")]
    AckTimeout(Duration),

    #[error("Stats pusher already started")]
    AlreadyStarted,

    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}
