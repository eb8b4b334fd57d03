//! Request and response records exchanged with the server.
//!
//! Requests ride as textual JSON objects; responses and process frames ride
//! inside the length-delimited framing in [`crate::codec`]. Optional fields
//! are omitted entirely rather than sent as null.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{BindMount, ResourceLimits, TtySpec};

/// Reply to a ping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {}

/// Request to create a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Grace period in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grace_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rootfs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub privileged: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bind_mounts: Vec<BindMount>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// One environment entry of a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// Reply to a create request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateResponse {
    /// Handle assigned by the server.
    pub handle: String,
}

/// Reply to a destroy request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyResponse {}

/// Request to stop all processes in a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopRequest {
    pub handle: String,
    /// Skip the graceful phase and kill outright.
    pub kill: bool,
}

/// Reply to a stop request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {}

/// Request to set a container's memory limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitMemoryRequest {
    pub handle: String,
    pub limit_in_bytes: u64,
}

/// Request to set a container's CPU limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitCpuRequest {
    pub handle: String,
    pub limit_in_shares: u64,
}

/// Request to set a container's bandwidth limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitBandwidthRequest {
    pub handle: String,
    pub rate: u64,
    pub burst: u64,
}

/// Request to set a container's disk quota.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitDiskRequest {
    pub handle: String,
    pub block_soft: u64,
    pub block_hard: u64,
    pub inode_soft: u64,
    pub inode_hard: u64,
    pub byte_soft: u64,
    pub byte_hard: u64,
}

/// Request to map a host port into a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetInRequest {
    pub handle: String,
    /// Requested host port; zero lets the server allocate.
    pub host_port: u32,
    /// Requested container port; zero mirrors the host port.
    pub container_port: u32,
}

/// Reply to a net-in request, naming the allocated ports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetInResponse {
    pub host_port: u32,
    pub container_port: u32,
}

/// Request to permit outbound traffic from a container.
///
/// Empty collections on the rule encode as absent fields, not empty arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutRequest {
    pub handle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<Vec<NetOutIpRange>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<NetOutPortRange>>,
    pub protocol: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icmps: Option<NetOutIcmpControl>,
    pub log: bool,
}

/// An address range of a net-out rule, endpoints in canonical text form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutIpRange {
    pub start: String,
    pub end: String,
}

/// A port range of a net-out rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutPortRange {
    pub start: u32,
    pub end: u32,
}

/// The ICMP filter of a net-out rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetOutIcmpControl {
    #[serde(rename = "type")]
    pub icmp_type: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

/// Reply to a net-out request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetOutResponse {}

/// Reply to a list request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListResponse {
    /// Handles of matching containers.
    pub handles: Vec<String>,
}

/// Request to spawn a process inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRequest {
    pub handle: String,
    pub path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    pub privileged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// PTY settings. Absent means no PTY is allocated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<TtySpec>,
    pub rlimits: ResourceLimits,
}

/// Source channel of a standard-IO payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    Stdin,
    Stdout,
    Stderr,
}

/// Signal deliverable to a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Ask the process to shut down.
    Terminate,
    /// Kill the process outright.
    Kill,
}

/// The frame multiplexed in both directions on a process stream.
///
/// Only `process_id` is always present. Exactly one frame per session carries
/// `exit_status` or `error`; that frame ends the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessPayload {
    pub process_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<StreamSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tty: Option<TtySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
