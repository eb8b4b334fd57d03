//! Connection to a container-management server.
//!
//! A [`Connection`] holds only the server's address. Single-shot operations
//! open a transport, perform one HTTP/1.1 exchange, and decode one framed
//! response; [`Connection::run`] and [`Connection::attach`] instead hijack
//! the transport and hand it to a process session.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_stream::StreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use url::form_urlencoded;

use arbor_protocol::codec;
use arbor_protocol::messages::{
    CreateRequest, CreateResponse, DestroyResponse, EnvVar, LimitBandwidthRequest,
    LimitCpuRequest, LimitDiskRequest, LimitMemoryRequest, ListResponse, NetInRequest,
    NetInResponse, NetOutIcmpControl, NetOutIpRange, NetOutPortRange, NetOutRequest,
    NetOutResponse, PingResponse, RunRequest, StopRequest, StopResponse,
};
use arbor_protocol::types::{
    BandwidthLimits, Capacity, ContainerInfo, ContainerSpec, CpuLimits, DiskLimits, MemoryLimits,
    NetOutRule, ProcessSpec,
};

use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};
use crate::hijack;
use crate::process::{self, Process, ProcessIo};

/// Client connection to a container-management server.
///
/// Holds only endpoint configuration; every call opens its own transport, so
/// a `Connection` is cheap to clone and safe to share across tasks. There is
/// nothing to close: tearing down in-flight work means dropping the values
/// that own its transports.
#[derive(Debug, Clone)]
pub struct Connection {
    endpoint: Endpoint,
}

impl Connection {
    /// Creates a connection to the given endpoint.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    /// Creates a connection to a TCP endpoint (`host:port`).
    #[must_use]
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self::new(Endpoint::Tcp(addr.into()))
    }

    /// Creates a connection to a Unix socket endpoint.
    #[must_use]
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Self::new(Endpoint::Unix(path.as_ref().to_path_buf()))
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Checks that the server is reachable and answering.
    pub async fn ping(&self) -> Result<()> {
        let _: PingResponse = self.round_trip(Method::GET, "/ping", None::<&()>).await?;
        Ok(())
    }

    /// Returns the total resources available on the server.
    pub async fn capacity(&self) -> Result<Capacity> {
        self.round_trip(Method::GET, "/capacity", None::<&()>).await
    }

    /// Creates a container and returns its server-assigned handle.
    pub async fn create(&self, spec: ContainerSpec) -> Result<String> {
        let request = create_request(spec)?;
        let response: CreateResponse = self
            .round_trip(Method::POST, "/containers", Some(&request))
            .await?;
        Ok(response.handle)
    }

    /// Destroys a container.
    pub async fn destroy(&self, handle: &str) -> Result<()> {
        let _: DestroyResponse = self
            .round_trip(Method::DELETE, &format!("/containers/{handle}"), None::<&()>)
            .await?;
        Ok(())
    }

    /// Stops all processes in a container. `kill` skips the graceful phase.
    pub async fn stop(&self, handle: &str, kill: bool) -> Result<()> {
        let request = StopRequest {
            handle: handle.to_string(),
            kill,
        };
        let _: StopResponse = self
            .round_trip(
                Method::PUT,
                &format!("/containers/{handle}/stop"),
                Some(&request),
            )
            .await?;
        Ok(())
    }

    /// Sets a container's memory limits, returning the effective values.
    pub async fn limit_memory(&self, handle: &str, limits: MemoryLimits) -> Result<MemoryLimits> {
        let request = LimitMemoryRequest {
            handle: handle.to_string(),
            limit_in_bytes: limits.limit_in_bytes,
        };
        self.round_trip(
            Method::PUT,
            &format!("/containers/{handle}/limits/memory"),
            Some(&request),
        )
        .await
    }

    /// Returns a container's current memory limits.
    pub async fn current_memory_limits(&self, handle: &str) -> Result<MemoryLimits> {
        self.round_trip(
            Method::GET,
            &format!("/containers/{handle}/limits/memory"),
            None::<&()>,
        )
        .await
    }

    /// Sets a container's CPU limits, returning the effective values.
    pub async fn limit_cpu(&self, handle: &str, limits: CpuLimits) -> Result<CpuLimits> {
        let request = LimitCpuRequest {
            handle: handle.to_string(),
            limit_in_shares: limits.limit_in_shares,
        };
        self.round_trip(
            Method::PUT,
            &format!("/containers/{handle}/limits/cpu"),
            Some(&request),
        )
        .await
    }

    /// Returns a container's current CPU limits.
    pub async fn current_cpu_limits(&self, handle: &str) -> Result<CpuLimits> {
        self.round_trip(
            Method::GET,
            &format!("/containers/{handle}/limits/cpu"),
            None::<&()>,
        )
        .await
    }

    /// Sets a container's bandwidth limits, returning the effective values.
    pub async fn limit_bandwidth(
        &self,
        handle: &str,
        limits: BandwidthLimits,
    ) -> Result<BandwidthLimits> {
        let request = LimitBandwidthRequest {
            handle: handle.to_string(),
            rate: limits.rate,
            burst: limits.burst,
        };
        self.round_trip(
            Method::PUT,
            &format!("/containers/{handle}/limits/bandwidth"),
            Some(&request),
        )
        .await
    }

    /// Returns a container's current bandwidth limits.
    pub async fn current_bandwidth_limits(&self, handle: &str) -> Result<BandwidthLimits> {
        self.round_trip(
            Method::GET,
            &format!("/containers/{handle}/limits/bandwidth"),
            None::<&()>,
        )
        .await
    }

    /// Sets a container's disk quota, returning the effective values.
    pub async fn limit_disk(&self, handle: &str, limits: DiskLimits) -> Result<DiskLimits> {
        let request = LimitDiskRequest {
            handle: handle.to_string(),
            block_soft: limits.block_soft,
            block_hard: limits.block_hard,
            inode_soft: limits.inode_soft,
            inode_hard: limits.inode_hard,
            byte_soft: limits.byte_soft,
            byte_hard: limits.byte_hard,
        };
        self.round_trip(
            Method::PUT,
            &format!("/containers/{handle}/limits/disk"),
            Some(&request),
        )
        .await
    }

    /// Returns a container's current disk quota.
    pub async fn current_disk_limits(&self, handle: &str) -> Result<DiskLimits> {
        self.round_trip(
            Method::GET,
            &format!("/containers/{handle}/limits/disk"),
            None::<&()>,
        )
        .await
    }

    /// Maps a host port into the container. Returns the allocated
    /// `(host_port, container_port)` pair.
    pub async fn net_in(
        &self,
        handle: &str,
        host_port: u32,
        container_port: u32,
    ) -> Result<(u32, u32)> {
        let request = NetInRequest {
            handle: handle.to_string(),
            host_port,
            container_port,
        };
        let response: NetInResponse = self
            .round_trip(
                Method::POST,
                &format!("/containers/{handle}/net/in"),
                Some(&request),
            )
            .await?;
        Ok((response.host_port, response.container_port))
    }

    /// Permits outbound traffic matching the rule.
    ///
    /// A rule naming an unsupported protocol fails with
    /// [`ClientError::InvalidProtocol`] before any request is made.
    pub async fn net_out(&self, handle: &str, rule: NetOutRule) -> Result<()> {
        let request = net_out_request(handle, &rule)?;
        let _: NetOutResponse = self
            .round_trip(
                Method::POST,
                &format!("/containers/{handle}/net/out"),
                Some(&request),
            )
            .await?;
        Ok(())
    }

    /// Lists container handles, filtered by property key/value pairs.
    pub async fn list(&self, filters: &BTreeMap<String, String>) -> Result<Vec<String>> {
        let mut path = "/containers".to_string();
        if !filters.is_empty() {
            let query: String = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(filters.iter())
                .finish();
            path.push('?');
            path.push_str(&query);
        }
        let response: ListResponse = self.round_trip(Method::GET, &path, None::<&()>).await?;
        Ok(response.handles)
    }

    /// Returns a container's info record.
    pub async fn info(&self, handle: &str) -> Result<ContainerInfo> {
        self.round_trip(
            Method::GET,
            &format!("/containers/{handle}/info"),
            None::<&()>,
        )
        .await
    }

    /// Spawns a process in the container and binds a session to it.
    pub async fn run(&self, handle: &str, spec: ProcessSpec, io: ProcessIo) -> Result<Process> {
        let request = run_request(handle, spec);
        let body = codec::encode_request(&request)?;
        let stream = hijack::request(
            &self.endpoint,
            "POST",
            &format!("/containers/{handle}/processes"),
            Some(&body[..]),
        )
        .await?;
        process::start(stream, io).await
    }

    /// Binds a session to a process already running in the container.
    pub async fn attach(&self, handle: &str, process_id: u32, io: ProcessIo) -> Result<Process> {
        let stream = hijack::request(
            &self.endpoint,
            "GET",
            &format!("/containers/{handle}/processes/{process_id}"),
            None,
        )
        .await?;
        process::start(stream, io).await
    }

    /// Streams the reader's bytes to `dst_path` inside the container.
    ///
    /// The body is the reader's contents verbatim; nothing is framed.
    pub async fn stream_in(
        &self,
        handle: &str,
        dst_path: &str,
        reader: impl AsyncRead + Send + 'static,
    ) -> Result<()> {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("destination", dst_path)
            .finish();
        let body = StreamBody::new(
            ReaderStream::new(reader).map(|chunk| chunk.map(Frame::data)),
        );

        let mut sender = self.handshake().await?;
        let request = Request::builder()
            .method(Method::PUT)
            .uri(format!("/containers/{handle}/files?{query}"))
            .header("Host", "localhost")
            .header("Content-Type", "application/octet-stream")
            .body(body)?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        if !status.is_success() {
            return Err(ClientError::http(status.as_u16(), &bytes));
        }
        Ok(())
    }

    /// Streams `src_path` inside the container back to the caller.
    ///
    /// Errors before the first byte surface here; a body cut short against
    /// its declared length surfaces as a read error on the returned reader.
    pub async fn stream_out(
        &self,
        handle: &str,
        src_path: &str,
    ) -> Result<impl AsyncRead + Send + Unpin> {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("source", src_path)
            .finish();

        let mut sender = self.handshake::<Full<Bytes>>().await?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("/containers/{handle}/files?{query}"))
            .header("Host", "localhost")
            .body(Full::new(Bytes::new()))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        if !status.is_success() {
            let bytes = response.into_body().collect().await?.to_bytes();
            return Err(ClientError::http(status.as_u16(), &bytes));
        }

        let stream = response
            .into_body()
            .into_data_stream()
            .map(|chunk| chunk.map_err(io::Error::other));
        Ok(StreamReader::new(stream))
    }

    /// Performs one request/response exchange and decodes one framed message.
    async fn round_trip<Req, Resp>(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<&Req>,
    ) -> Result<Resp>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let mut sender = self.handshake::<Full<Bytes>>().await?;

        let builder = Request::builder()
            .method(method)
            .uri(path_and_query)
            .header("Host", "localhost");
        let request = match body {
            Some(body) => {
                let bytes = codec::encode_request(body)?;
                builder
                    .header("Content-Type", "application/json")
                    .header("Content-Length", bytes.len())
                    .body(Full::new(Bytes::from(bytes)))?
            }
            None => builder.body(Full::new(Bytes::new()))?,
        };

        let response = sender.send_request(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        if !status.is_success() {
            return Err(ClientError::http(status.as_u16(), &bytes));
        }
        Ok(codec::decode_frame(&bytes)?)
    }

    /// Opens a transport and performs the HTTP/1.1 client handshake on it.
    async fn handshake<B>(&self) -> Result<hyper::client::conn::http1::SendRequest<B>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let stream = self.endpoint.connect().await?;
        let io = TokioIo::new(stream);
        let (sender, conn) = hyper::client::conn::http1::handshake(io).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(error = %err, "connection task ended");
            }
        });
        Ok(sender)
    }
}

/// Builds the create body, splitting `KEY=VALUE` environment entries.
fn create_request(spec: ContainerSpec) -> Result<CreateRequest> {
    let mut env = Vec::with_capacity(spec.env.len());
    for entry in &spec.env {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(ClientError::InvalidArgument(format!(
                "malformed environment variable: {entry}"
            )));
        };
        env.push(EnvVar {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    Ok(CreateRequest {
        handle: spec.handle,
        grace_time: spec
            .grace_time
            .map(|grace| u32::try_from(grace.as_secs()).unwrap_or(u32::MAX)),
        rootfs: spec.rootfs,
        network: spec.network,
        privileged: spec.privileged,
        bind_mounts: spec.bind_mounts,
        properties: spec.properties,
        env,
    })
}

/// Builds the net-out body.
///
/// Empty collections encode as absent fields and IP endpoints as their
/// canonical text form. An out-of-range protocol fails before any I/O.
fn net_out_request(handle: &str, rule: &NetOutRule) -> Result<NetOutRequest> {
    let protocol = rule
        .protocol
        .wire_value()
        .ok_or(ClientError::InvalidProtocol)?;

    let networks = (!rule.networks.is_empty()).then(|| {
        rule.networks
            .iter()
            .map(|range| NetOutIpRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
            })
            .collect()
    });
    let ports = (!rule.ports.is_empty()).then(|| {
        rule.ports
            .iter()
            .map(|range| NetOutPortRange {
                start: u32::from(range.start),
                end: u32::from(range.end),
            })
            .collect()
    });
    let icmps = rule.icmps.map(|control| NetOutIcmpControl {
        icmp_type: u32::from(control.icmp_type),
        code: control.code,
    });

    Ok(NetOutRequest {
        handle: handle.to_string(),
        networks,
        ports,
        protocol,
        icmps,
        log: rule.log,
    })
}

fn run_request(handle: &str, spec: ProcessSpec) -> RunRequest {
    RunRequest {
        handle: handle.to_string(),
        path: spec.path,
        args: spec.args,
        dir: spec.dir,
        privileged: spec.privileged,
        user: spec.user,
        tty: spec.tty,
        rlimits: spec.limits,
    }
}
