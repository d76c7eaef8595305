//! Error types for the psmove-transport crate.

use psmove_protocol::ProtocolError;

/// Errors that can occur while managing the service connection
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport has not been started, or was already shut down
    #[error("Transport not started")]
    NotStarted,

    /// `startup` was called on a transport that is already running
    #[error("Transport already started")]
    AlreadyStarted,

    /// The background worker is gone and can no longer accept commands
    #[error("Transport worker disconnected")]
    WorkerDisconnected,

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Socket or thread I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing or encoding failure
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Convenience type alias for Results using TransportError.
pub type Result<T> = std::result::Result<T, TransportError>;
