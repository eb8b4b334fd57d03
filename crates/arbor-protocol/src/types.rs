//! Input data model for the container-management API.
//!
//! These are the values callers hand to (and receive from) a connection:
//! container and process specifications, resource limits, network rules, and
//! the info record. Types that ride the wire unchanged carry serde derives;
//! the rest are converted into [`crate::messages`] records by the client.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Specification for a new container.
///
/// Every field is optional; the zero value asks the server for a default
/// container with a server-assigned handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Requested handle. `None` lets the server assign one.
    pub handle: Option<String>,
    /// How long the container outlives its last client reference.
    pub grace_time: Option<Duration>,
    /// Root filesystem path or provider URI.
    pub rootfs: Option<String>,
    /// Network subnet selector.
    pub network: Option<String>,
    /// Whether the container runs without user namespacing.
    pub privileged: bool,
    /// Bind mounts, applied in order.
    pub bind_mounts: Vec<BindMount>,
    /// Arbitrary key/value properties stored with the container.
    pub properties: BTreeMap<String, String>,
    /// Environment entries in `KEY=VALUE` form.
    pub env: Vec<String>,
}

/// A host or container directory mounted into the new container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindMount {
    /// Source path, interpreted according to `origin`.
    pub src_path: String,
    /// Destination path inside the container.
    pub dst_path: String,
    /// Read-only or read-write.
    pub mode: BindMountMode,
    /// Where `src_path` is resolved.
    pub origin: BindMountOrigin,
}

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BindMountMode {
    /// Read-only.
    #[default]
    Ro,
    /// Read-write.
    Rw,
}

/// Filesystem the source path of a bind mount is resolved in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindMountOrigin {
    /// The host filesystem.
    #[default]
    Host,
    /// The container's own filesystem.
    Container,
}

/// Memory limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryLimits {
    /// Memory usage limit in bytes.
    pub limit_in_bytes: u64,
}

/// CPU limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuLimits {
    /// Relative CPU weight in scheduler shares.
    pub limit_in_shares: u64,
}

/// Network bandwidth limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthLimits {
    /// Sustained rate in bytes per second.
    pub rate: u64,
    /// Burst allowance in bytes.
    pub burst: u64,
}

/// Disk quota limits for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskLimits {
    /// Soft limit on block usage.
    pub block_soft: u64,
    /// Hard limit on block usage.
    pub block_hard: u64,
    /// Soft limit on inode usage.
    pub inode_soft: u64,
    /// Hard limit on inode usage.
    pub inode_hard: u64,
    /// Soft limit on byte usage.
    pub byte_soft: u64,
    /// Hard limit on byte usage.
    pub byte_hard: u64,
}

/// `setrlimit` values applied to a process at creation.
///
/// Absent fields leave the server's defaults in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Address space size in bytes (`RLIMIT_AS`).
    #[serde(rename = "as", skip_serializing_if = "Option::is_none")]
    pub address_space: Option<u64>,
    /// Core file size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub core: Option<u64>,
    /// CPU time in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u64>,
    /// Data segment size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<u64>,
    /// Created file size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fsize: Option<u64>,
    /// Number of file locks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locks: Option<u64>,
    /// Locked memory in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memlock: Option<u64>,
    /// Bytes in POSIX message queues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msgqueue: Option<u64>,
    /// Nice ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nice: Option<u64>,
    /// Number of open files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
    /// Number of processes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nproc: Option<u64>,
    /// Resident set size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rss: Option<u64>,
    /// Real-time priority ceiling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtprio: Option<u64>,
    /// Number of pending signals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigpending: Option<u64>,
    /// Stack size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<u64>,
}

/// Network protocol selector for an outbound rule.
///
/// A transparent wrapper rather than a closed enum: values outside the
/// supported set are representable so the client can reject them before any
/// request is made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Protocol(pub u32);

impl Protocol {
    /// All protocols.
    pub const ALL: Self = Self(0);
    /// TCP only.
    pub const TCP: Self = Self(1);
    /// UDP only.
    pub const UDP: Self = Self(2);
    /// ICMP only.
    pub const ICMP: Self = Self(3);
    /// TCP and UDP.
    pub const TCP_UDP: Self = Self(4);

    /// Returns the wire value, or `None` for a protocol outside the
    /// supported set.
    #[must_use]
    pub fn wire_value(self) -> Option<u32> {
        (self.0 <= Self::TCP_UDP.0).then_some(self.0)
    }
}

/// An inclusive range of IP addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    /// First address in the range.
    pub start: IpAddr,
    /// Last address in the range.
    pub end: IpAddr,
}

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortRange {
    /// First port in the range.
    pub start: u16,
    /// Last port in the range.
    pub end: u16,
}

/// ICMP message filter for an outbound rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IcmpControl {
    /// ICMP message type.
    pub icmp_type: u8,
    /// ICMP message code. `None` matches every code.
    pub code: Option<i32>,
}

/// An outbound network access rule.
///
/// The zero value permits all protocols to all destinations without logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetOutRule {
    /// Protocol the rule applies to.
    pub protocol: Protocol,
    /// Destination address ranges. Empty means unrestricted.
    pub networks: Vec<IpRange>,
    /// Destination port ranges. Empty means unrestricted.
    pub ports: Vec<PortRange>,
    /// ICMP filter, only meaningful for ICMP-carrying protocols.
    pub icmps: Option<IcmpControl>,
    /// Whether matching packets are logged.
    pub log: bool,
}

/// Specification for a process to run inside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Program path.
    pub path: String,
    /// Argument list, excluding the program path.
    pub args: Vec<String>,
    /// Working directory inside the container.
    pub dir: Option<String>,
    /// User to run as.
    pub user: Option<String>,
    /// Whether the process runs with full privileges.
    pub privileged: bool,
    /// Resource limits applied at creation.
    pub limits: ResourceLimits,
    /// PTY allocation. `None` means no PTY.
    pub tty: Option<TtySpec>,
}

/// PTY settings for a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtySpec {
    /// Initial window size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_size: Option<WindowSize>,
}

/// Terminal window dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSize {
    /// Width in character cells.
    pub columns: u32,
    /// Height in character cells.
    pub rows: u32,
}

/// Total resources available on a server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacity {
    /// Memory in bytes.
    pub memory_in_bytes: u64,
    /// Disk in bytes.
    pub disk_in_bytes: u64,
    /// Maximum number of containers.
    pub max_containers: u64,
}

/// Snapshot of a container's state and statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerInfo {
    /// Lifecycle state reported by the server.
    pub state: String,
    /// Events recorded against the container, oldest first.
    pub events: Vec<String>,
    /// Address of the host side of the container's network.
    pub host_ip: String,
    /// Address of the container side of the network.
    pub container_ip: String,
    /// Container filesystem path on the host.
    pub container_path: String,
    /// Ids of processes running in the container.
    pub process_ids: Vec<u32>,
    /// Key/value properties stored with the container.
    pub properties: BTreeMap<String, String>,
    /// Memory statistics.
    pub memory_stat: MemoryStat,
    /// CPU statistics.
    pub cpu_stat: CpuStat,
    /// Disk statistics.
    pub disk_stat: DiskStat,
    /// Bandwidth statistics.
    pub bandwidth_stat: BandwidthStat,
    /// Port mappings established by net-in, oldest first.
    pub mapped_ports: Vec<PortMapping>,
}

/// Memory statistics for a container, mirroring the cgroup memory stat file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStat {
    pub cache: u64,
    pub rss: u64,
    pub mapped_file: u64,
    pub pgpgin: u64,
    pub pgpgout: u64,
    pub swap: u64,
    pub pgfault: u64,
    pub pgmajfault: u64,
    pub inactive_anon: u64,
    pub active_anon: u64,
    pub inactive_file: u64,
    pub active_file: u64,
    pub unevictable: u64,
    pub hierarchical_memory_limit: u64,
    pub hierarchical_memsw_limit: u64,
    pub total_cache: u64,
    pub total_rss: u64,
    pub total_mapped_file: u64,
    pub total_pgpgin: u64,
    pub total_pgpgout: u64,
    pub total_swap: u64,
    pub total_pgfault: u64,
    pub total_pgmajfault: u64,
    pub total_inactive_anon: u64,
    pub total_active_anon: u64,
    pub total_inactive_file: u64,
    pub total_active_file: u64,
    pub total_unevictable: u64,
}

/// CPU statistics for a container, in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStat {
    /// Total CPU time.
    pub usage: u64,
    /// Time spent in user mode.
    pub user: u64,
    /// Time spent in kernel mode.
    pub system: u64,
}

/// Disk statistics for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskStat {
    /// Bytes in use.
    pub bytes_used: u64,
    /// Inodes in use.
    pub inodes_used: u64,
}

/// Bandwidth statistics for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandwidthStat {
    /// Inbound sustained rate.
    pub in_rate: u64,
    /// Inbound burst allowance.
    pub in_burst: u64,
    /// Outbound sustained rate.
    pub out_rate: u64,
    /// Outbound burst allowance.
    pub out_burst: u64,
}

/// A host-to-container port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortMapping {
    /// Port on the host.
    pub host_port: u32,
    /// Port inside the container.
    pub container_port: u32,
}
