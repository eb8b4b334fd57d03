//! # arbor-protocol
//!
//! Wire protocol for the arbor container-management API.
//!
//! This crate defines the three layers shared by the client and by test
//! fixtures:
//!
//! - [`types`]: the caller-facing data model (container specs, resource
//!   limits, network rules, container info).
//! - [`messages`]: the request and response records exchanged with the
//!   server, including the [`messages::ProcessPayload`] frame multiplexed on
//!   process streams.
//! - [`codec`]: the two body encodings — textual JSON objects on the request
//!   side, length-delimited frames on response and process streams.

pub mod codec;
pub mod error;
pub mod messages;
pub mod types;

pub use error::{ProtocolError, Result};
pub use messages::{ProcessPayload, Signal, StreamSource};
