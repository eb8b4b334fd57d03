//! Server endpoint addressing.

use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

use crate::error::Result;

/// Byte stream the client drives in both directions.
pub trait RawStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RawStream for T {}

/// A connected transport, erased over the endpoint kind.
pub type BoxedStream = Box<dyn RawStream>;

/// Address of a container-management server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port`.
    Tcp(String),
    /// Unix domain socket path.
    Unix(PathBuf),
}

impl Endpoint {
    /// Opens a fresh transport to the endpoint.
    pub(crate) async fn connect(&self) -> Result<BoxedStream> {
        Ok(match self {
            Self::Tcp(addr) => Box::new(TcpStream::connect(addr).await?),
            Self::Unix(path) => Box::new(UnixStream::connect(path).await?),
        })
    }
}
