//! Error types for protocol encoding and decoding.

use thiserror::Error;

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload was not valid for the expected message.
    #[error("malformed frame: {0}")]
    Frame(#[from] serde_json::Error),

    /// The buffer ended inside a frame.
    #[error("truncated frame")]
    Truncated,

    /// The length prefix did not terminate within ten bytes.
    #[error("malformed length prefix")]
    InvalidLength,

    /// The length prefix named a payload above the frame size limit.
    #[error("frame of {0} bytes exceeds frame size limit")]
    FrameTooLarge(u64),
}
