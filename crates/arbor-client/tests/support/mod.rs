//! Shared scaffolding for connection tests: a scripted single-connection
//! server, raw HTTP helpers, and in-memory IO endpoints.
//!
//! Request/response endpoints are scripted at the HTTP level; hijacked
//! process endpoints write their response head by hand and then speak frames
//! directly, the same way the real server side behaves after a hijack.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use arbor_protocol::messages::ProcessPayload;

/// A mock server bound to a loopback port, serving exactly one connection
/// with the given handler.
pub struct MockServer {
    addr: String,
    handle: JoinHandle<()>,
}

impl MockServer {
    /// Address to hand to `Connection::tcp`.
    pub fn addr(&self) -> String {
        self.addr.clone()
    }

    /// Waits for the handler to finish, propagating its panics (and with
    /// them any failed assertion made on the server side).
    pub async fn finish(self) {
        self.handle.await.unwrap();
    }
}

/// Starts a mock server around a connection handler.
pub async fn serve<F, Fut>(handler: F) -> MockServer
where
    F: FnOnce(TcpStream) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        handler(stream).await;
    });
    MockServer { addr, handle }
}

/// Parsed request line and headers.
pub struct RequestHead {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
}

/// Reads the request head off the socket.
pub async fn read_head(stream: &mut TcpStream) -> RequestHead {
    let mut raw = Vec::new();
    while !raw.ends_with(b"\r\n\r\n") {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.unwrap();
        raw.push(byte[0]);
    }
    let text = String::from_utf8(raw).unwrap();
    let mut lines = text.split("\r\n");

    let request_line = lines.next().unwrap();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap().to_string();
    let target = parts.next().unwrap().to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }
    }

    RequestHead {
        method,
        target,
        headers,
    }
}

/// Reads the request body, honoring either framing the client may use.
pub async fn read_request_body(stream: &mut TcpStream, head: &RequestHead) -> Vec<u8> {
    let chunked = head
        .headers
        .get("transfer-encoding")
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("chunked"));
    if chunked {
        return read_chunked_body(stream).await;
    }

    let length: usize = head
        .headers
        .get("content-length")
        .map(|value| value.parse().unwrap())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    stream.read_exact(&mut body).await.unwrap();
    body
}

async fn read_chunked_body(stream: &mut TcpStream) -> Vec<u8> {
    let mut body = Vec::new();
    loop {
        let size_line = read_crlf_line(stream).await;
        let size = usize::from_str_radix(size_line.trim(), 16).unwrap();
        if size == 0 {
            read_crlf_line(stream).await;
            return body;
        }
        let mut chunk = vec![0u8; size];
        stream.read_exact(&mut chunk).await.unwrap();
        body.extend_from_slice(&chunk);
        read_crlf_line(stream).await;
    }
}

async fn read_crlf_line(stream: &mut TcpStream) -> String {
    let mut raw = Vec::new();
    while !raw.ends_with(b"\r\n") {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.unwrap();
        raw.push(byte[0]);
    }
    raw.truncate(raw.len() - 2);
    String::from_utf8(raw).unwrap()
}

/// Writes a complete response with the given status and body.
pub async fn respond(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason(status),
        body.len(),
    );
    stream.write_all(head.as_bytes()).await.unwrap();
    stream.write_all(body).await.unwrap();
    stream.flush().await.unwrap();
}

/// Writes a response head and leaves the connection raw for frames, as the
/// server does when it hijacks a process request.
pub async fn accept_process_stream(stream: &mut TcpStream) {
    stream.write_all(b"HTTP/1.1 200 OK\r\n\r\n").await.unwrap();
    stream.flush().await.unwrap();
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        423 => "Locked",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// Reads the client's upstream process payloads, which ride as a stream of
/// bare JSON objects.
#[derive(Default)]
pub struct PayloadReader {
    buf: Vec<u8>,
}

impl PayloadReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next upstream payload, reading more bytes as needed.
    pub async fn next(&mut self, stream: &mut TcpStream) -> io::Result<ProcessPayload> {
        loop {
            let (decoded, consumed) = {
                let mut frames =
                    serde_json::Deserializer::from_slice(&self.buf).into_iter::<ProcessPayload>();
                let decoded = match frames.next() {
                    Some(Ok(payload)) => Some(Ok(payload)),
                    Some(Err(err)) if err.is_eof() => None,
                    Some(Err(err)) => Some(Err(io::Error::other(err))),
                    None => None,
                };
                (decoded, frames.byte_offset())
            };

            match decoded {
                Some(Ok(payload)) => {
                    self.buf.drain(..consumed);
                    return Ok(payload);
                }
                Some(Err(err)) => return Err(err),
                None => {}
            }

            let mut chunk = [0u8; 1024];
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}

/// Shared in-memory sink for capturing a process's output.
#[derive(Clone, Default)]
pub struct CaptureBuffer(Arc<Mutex<Vec<u8>>>);

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl AsyncWrite for CaptureBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Stdin source that yields the given chunks one per read, then a clean end
/// of stream. Lets a test pin exactly where read boundaries fall.
pub struct ChunkedReader {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedReader {
    pub fn new<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(chunk) = self.get_mut().chunks.pop_front() {
            buf.put_slice(&chunk);
        }
        Poll::Ready(Ok(()))
    }
}

/// Stdin source that yields its data and then fails instead of reaching a
/// clean end of stream.
pub struct FailingReader {
    data: Option<Vec<u8>>,
}

impl FailingReader {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().data.take() {
            Some(data) => {
                buf.put_slice(&data);
                Poll::Ready(Ok(()))
            }
            None => Poll::Ready(Err(io::Error::other("stdin source broke"))),
        }
    }
}
