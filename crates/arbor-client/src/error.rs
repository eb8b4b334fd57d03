//! Error types for client operations.

use arbor_protocol::ProtocolError;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by connection and process operations.
///
/// Every operation returns at most one of these; nothing is retried. Callers
/// classify by variant, and [`ClientError::Http`] compares structurally on
/// status and body.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error on the underlying transport, surfaced verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP mechanics failed below the response layer.
    #[error("transport error: {0}")]
    Hyper(#[from] hyper::Error),

    /// Request construction failed.
    #[error("request error: {0}")]
    Request(#[from] hyper::http::Error),

    /// A frame or body could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server rejected the request.
    #[error("server returned {status}: {body}")]
    Http {
        /// Numeric response status.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// A net-out rule named a protocol outside the supported set.
    #[error("invalid protocol")]
    InvalidProtocol,

    /// An input value failed client-side validation before any I/O.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server reported a failure on a process stream.
    #[error("{0}")]
    Remote(String),

    /// A process stream ended before a terminal frame arrived.
    #[error("connection closed before exit status received")]
    ConnectionClosed,
}

impl ClientError {
    /// Builds an [`ClientError::Http`] from a status code and raw body bytes.
    pub(crate) fn http(status: u16, body: &[u8]) -> Self {
        Self::Http {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }
}

/// Structural equality for the variants that carry comparable values:
/// [`ClientError::Http`] on status and body, the validation and remote
/// variants on their messages. Transport and decode failures wrap error
/// sources without meaningful equality and never compare equal.
impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Http { status, body },
                Self::Http {
                    status: other_status,
                    body: other_body,
                },
            ) => status == other_status && body == other_body,
            (Self::InvalidProtocol, Self::InvalidProtocol) => true,
            (Self::InvalidArgument(message), Self::InvalidArgument(other_message)) => {
                message == other_message
            }
            (Self::Remote(message), Self::Remote(other_message)) => message == other_message,
            (Self::ConnectionClosed, Self::ConnectionClosed) => true,
            _ => false,
        }
    }
}
