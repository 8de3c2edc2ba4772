//! Error types for flow-plugin-rpc operations.

use std::io;
use thiserror::Error;

/// The error type for flow-plugin-rpc operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing frames.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON body parsed but is not a request or a response.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// A specialized Result type for flow-plugin-rpc operations.
pub type Result<T> = std::result::Result<T, Error>;
