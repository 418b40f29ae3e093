//! Error types for the two subsystems that can fail: the outbound
//! callback client and the send/close write path.

use thiserror::Error;

/// Classification of a failed (or successful) controller callback,
/// matching the `errorType` taxonomy of §4.C.
#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("controller callback timed out")]
    Timeout,
    #[error("controller callback transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("controller callback returned status {0}")]
    HttpStatus(reqwest::StatusCode),
}

impl CallbackError {
    /// The `errorType` string used in logs; never sent over the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            CallbackError::Timeout => "timeout",
            CallbackError::Network(_) => "network",
            CallbackError::HttpStatus(_) => "http_error",
        }
    }
}

/// Internal-only error from the send/close write path (§4.E step 3).
/// Never surfaces past the handler as anything other than a `500`.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("client writer is gone")]
    WriterGone,
}
