//! Error types for the ADS client.

use thiserror::Error;

/// Error type for the ADS client.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established (dial or stream open failed).
    #[error("connection error: {0}")]
    Connection(String),

    /// The gRPC stream failed with a status.
    #[cfg(feature = "transport-tonic")]
    #[error("stream error: {0}")]
    Status(#[from] tonic::Status),

    /// The stream was closed by the server or its send half is gone.
    #[error("stream closed")]
    StreamClosed,

    /// A message could not be decoded from the wire.
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    /// A decoded message failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The session already has an open stream.
    #[error("session is already streaming")]
    AlreadyStreaming,

    /// The session was closed locally.
    #[error("session closed")]
    Closed,
}

/// Result type alias for ADS client operations.
pub type Result<T> = std::result::Result<T, Error>;
