//! # arbor-client
//!
//! Client connection layer for an arbor container-management server.
//!
//! A [`Connection`] drives the server over HTTP/1.1 on a TCP or Unix stream
//! socket: container lifecycle, resource limits, networking, and file
//! streaming are single-shot exchanges, while [`Connection::run`] and
//! [`Connection::attach`] hijack the transport into a long-lived
//! bidirectional process stream with stdin forwarding, signal delivery,
//! terminal resizing, and exit-status propagation.
//!
//! ```no_run
//! use arbor_client::{Connection, ProcessIo};
//! use arbor_protocol::types::ProcessSpec;
//!
//! # async fn demo() -> arbor_client::Result<()> {
//! let conn = Connection::tcp("127.0.0.1:7777");
//! let handle = conn.create(Default::default()).await?;
//!
//! let spec = ProcessSpec {
//!     path: "/bin/date".into(),
//!     ..Default::default()
//! };
//! let mut process = conn.run(&handle, spec, ProcessIo::default()).await?;
//! let status = process.wait().await?;
//! println!("exited with {status}");
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod process;

mod hijack;

pub use connection::Connection;
pub use endpoint::Endpoint;
pub use error::{ClientError, Result};
pub use process::{Process, ProcessIo};
