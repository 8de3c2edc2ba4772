//! Error types for the plugin runtime.

use thiserror::Error;

/// Errors that can occur in the plugin runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// Framing or message-level failure on the wire.
    #[error("RPC error: {0}")]
    Rpc(#[from] flow_plugin_rpc::Error),

    /// The host answered an outbound request with an error object.
    #[error("Host error {code}: {message}")]
    Host {
        /// The JSON-RPC error code sent by the host.
        code: i64,
        /// The error message sent by the host.
        message: String,
    },

    /// The transport closed before a response arrived.
    #[error("Session closed")]
    SessionClosed,

    /// A request arrived before `initialize` completed.
    #[error("Plugin has not been initialized")]
    NotInitialized,

    /// Inbound parameters had the wrong shape.
    #[error("Invalid params for {method}: {reason}")]
    InvalidParams {
        /// Method whose parameters were rejected.
        method: String,
        /// What was wrong.
        reason: String,
    },

    /// Two callbacks were registered under the same name.
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName {
        /// Registry kind ("context menu" or "action").
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// A regex restriction failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Failed to load or apply runtime configuration.
    #[error("Configuration error at {path}: {reason}")]
    Config {
        /// The configuration file path.
        path: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Failed to install the tracing subscriber.
    #[error("Logging error: {0}")]
    Logging(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for plugin runtime operations.
pub type Result<T> = std::result::Result<T, Error>;
