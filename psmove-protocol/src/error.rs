//! Error types for the psmove-protocol crate.

/// Errors raised while framing or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A frame header announced a body larger than the codec accepts
    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge {
        /// Announced body length
        len: usize,
        /// Maximum accepted body length
        max: usize,
    },

    /// The frame body was not a valid protocol value
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Results using ProtocolError.
pub type Result<T> = std::result::Result<T, ProtocolError>;
