use psmove_transport::TransportError;
use thiserror::Error;

use crate::logging::LoggingError;
use crate::message::PayloadKind;

/// Errors that can occur in the client runtime
#[derive(Error, Debug)]
pub enum ClientError {
    /// Error from the connection layer
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Reasons a payload handle can no longer be resolved
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// The handle was issued before the most recent `update()`
    #[error("Payload handle expired: issued in cycle {handle_generation}, current cycle is {current_generation}")]
    Expired {
        handle_generation: u64,
        current_generation: u64,
    },

    /// A response handle was used to look up an event payload, or vice versa
    #[error("Payload handle refers to a {actual:?} payload, expected {expected:?}")]
    WrongKind {
        expected: PayloadKind,
        actual: PayloadKind,
    },

    /// The handle's slot does not exist in the current cycle
    #[error("Payload slot {slot} out of range")]
    OutOfRange { slot: u32 },

    /// The client is not running, so no payloads are retained
    #[error("Client is not running")]
    NotRunning,
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
