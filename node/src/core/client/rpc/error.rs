use std::time::Duration;

use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Ethereum url scheme must be websocket: {0}")]
    InvalidScheme(Url),

    #[error("Rate limit must allow at least one call per second")]
    InvalidRateLimit,

    #[error("Failed to connect to {url}: {message}")]
    Dial { url: Url, message: String },

    #[error("Rpc call {method} failed: {message}")]
    Call { method: String, message: String },

    #[error("Connection lost during {method}: {message}")]
    Transport { method: String, message: String },

    #[error("Timed out after {0:?} waiting for the rpc rate limiter")]
    RateLimitTimeout(Duration),

    #[error("Rpc call {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Unexpected response to {method}: {message}")]
    InvalidResponse { method: String, message: String },
}

impl RpcError {
    /// The chain already accepted a transaction with this nonce.
    pub fn is_nonce_too_low(&self) -> bool {
        match self {
            RpcError::Call { message, .. } => {
                let message = message.to_ascii_lowercase();
                message.contains("nonce too low") || message.contains("nonce is too low")
            }
            _ => false,
        }
    }

    pub fn invalid_response(method: &str, message: impl ToString) -> Self {
        RpcError::InvalidResponse { method: method.to_string(), message: message.to_string() }
    }
}
