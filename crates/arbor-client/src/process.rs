//! Process sessions over hijacked streams.
//!
//! A session multiplexes stdin and control frames upstream and stdout,
//! stderr, and the terminal frame downstream. Two tasks run per session: a
//! downstream reader that demultiplexes server frames, and (when the caller
//! supplies stdin) an upstream pump. The terminal outcome lands once in a
//! watch channel, so [`Process::wait`] is idempotent and race-free against
//! the reader task.

use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::sync::{watch, Mutex};

use arbor_protocol::codec;
use arbor_protocol::messages::{ProcessPayload, Signal, StreamSource};
use arbor_protocol::types::TtySpec;

use crate::endpoint::BoxedStream;
use crate::error::{ClientError, Result};
use crate::hijack::HijackedStream;

/// Upstream stdin read chunk size.
const STDIN_CHUNK_SIZE: usize = 8 * 1024;

type StdinSource = Pin<Box<dyn AsyncRead + Send>>;
type OutputSink = Pin<Box<dyn AsyncWrite + Send>>;

/// Standard-IO wiring for a process session.
///
/// Every field is optional. Without stdin the process sees no input; output
/// for an absent sink is discarded.
#[derive(Default)]
pub struct ProcessIo {
    /// Source forwarded to the process's stdin.
    ///
    /// Payloads ride the wire as text, so the source must produce valid
    /// UTF-8. Forwarding stops, with no end-of-input marker, at the first
    /// undecodable byte.
    pub stdin: Option<StdinSource>,
    /// Sink for the process's stdout.
    pub stdout: Option<OutputSink>,
    /// Sink for the process's stderr.
    pub stderr: Option<OutputSink>,
}

impl ProcessIo {
    /// Sets the stdin source.
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl AsyncRead + Send + 'static) -> Self {
        self.stdin = Some(Box::pin(stdin));
        self
    }

    /// Sets the stdout sink.
    #[must_use]
    pub fn with_stdout(mut self, stdout: impl AsyncWrite + Send + 'static) -> Self {
        self.stdout = Some(Box::pin(stdout));
        self
    }

    /// Sets the stderr sink.
    #[must_use]
    pub fn with_stderr(mut self, stderr: impl AsyncWrite + Send + 'static) -> Self {
        self.stderr = Some(Box::pin(stderr));
        self
    }
}

/// How a session ended.
#[derive(Debug, Clone)]
enum Terminal {
    Exited(u32),
    Failed(SessionError),
}

/// Failure observed by the downstream reader.
#[derive(Debug, Clone)]
enum SessionError {
    /// The server sent an error frame; message preserved verbatim.
    Remote(String),
    /// The stream ended before a terminal frame.
    Disconnected,
}

impl From<SessionError> for ClientError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Remote(message) => Self::Remote(message),
            SessionError::Disconnected => Self::ConnectionClosed,
        }
    }
}

/// Serialized writer for upstream frames.
///
/// Shared between the stdin pump and `signal`/`set_tty`; the lock covers a
/// whole frame, so frames never interleave.
#[derive(Clone)]
struct PayloadWriter {
    io: Arc<Mutex<WriteHalf<BoxedStream>>>,
}

impl PayloadWriter {
    fn new(writer: WriteHalf<BoxedStream>) -> Self {
        Self {
            io: Arc::new(Mutex::new(writer)),
        }
    }

    /// Writes one upstream frame in its textual request form.
    async fn send(&self, payload: &ProcessPayload) -> Result<()> {
        let bytes = codec::encode_request(payload)?;
        let mut io = self.io.lock().await;
        io.write_all(&bytes).await?;
        io.flush().await?;
        Ok(())
    }
}

/// Handle to a process running inside a container.
///
/// Obtained from [`crate::Connection::run`] or [`crate::Connection::attach`].
/// The handle owns the hijacked transport through its session tasks; dropping
/// it abandons the session and the transport closes behind it.
pub struct Process {
    id: u32,
    exit: watch::Receiver<Option<Terminal>>,
    writer: PayloadWriter,
}

impl std::fmt::Debug for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process").field("id", &self.id).finish()
    }
}

impl Process {
    /// Server-assigned process id, stable for the session's lifetime and
    /// usable to attach from a fresh connection.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Waits for the terminal frame and returns the exit status.
    ///
    /// Idempotent: every call observes the same outcome. Fails with
    /// [`ClientError::Remote`] when the server reported an error and
    /// [`ClientError::ConnectionClosed`] when the stream ended early.
    pub async fn wait(&mut self) -> Result<u32> {
        let outcome = self
            .exit
            .wait_for(|terminal| terminal.is_some())
            .await
            .map_err(|_| ClientError::ConnectionClosed)?
            .clone();
        match outcome {
            Some(Terminal::Exited(status)) => Ok(status),
            Some(Terminal::Failed(err)) => Err(err.into()),
            None => Err(ClientError::ConnectionClosed),
        }
    }

    /// Delivers a signal to the process.
    ///
    /// Returns once the frame is written; there is no acknowledgement.
    pub async fn signal(&self, signal: Signal) -> Result<()> {
        self.writer
            .send(&ProcessPayload {
                process_id: self.id,
                signal: Some(signal),
                ..Default::default()
            })
            .await
    }

    /// Updates the process's terminal settings.
    ///
    /// Returns once the frame is written; there is no acknowledgement.
    pub async fn set_tty(&self, tty: TtySpec) -> Result<()> {
        self.writer
            .send(&ProcessPayload {
                process_id: self.id,
                tty: Some(tty),
                ..Default::default()
            })
            .await
    }
}

/// Binds a session to a hijacked stream and spawns its tasks.
///
/// The first downstream frame names the session. A server that failed to
/// start the process reports it there, which fails the call synchronously;
/// whatever else the frame carries goes through the normal frame path so
/// nothing is dropped.
pub(crate) async fn start(stream: HijackedStream, io: ProcessIo) -> Result<Process> {
    let HijackedStream { mut reader, writer } = stream;

    let first: ProcessPayload = codec::read_frame(&mut reader)
        .await
        .map_err(|_| ClientError::ConnectionClosed)?;
    if let Some(message) = &first.error {
        return Err(ClientError::Remote(message.clone()));
    }

    let id = first.process_id;
    let writer = PayloadWriter::new(writer);
    let (exit_tx, exit_rx) = watch::channel(None);

    if let Some(stdin) = io.stdin {
        tokio::spawn(pump_stdin(id, stdin, writer.clone()));
    }
    tokio::spawn(read_payloads(first, reader, io.stdout, io.stderr, exit_tx));

    tracing::debug!(process_id = id, "process session started");
    Ok(Process {
        id,
        exit: exit_rx,
        writer,
    })
}

/// Downstream reader task: demultiplexes frames until a terminal one.
async fn read_payloads(
    first: ProcessPayload,
    mut reader: BufReader<ReadHalf<BoxedStream>>,
    mut stdout: Option<OutputSink>,
    mut stderr: Option<OutputSink>,
    exit: watch::Sender<Option<Terminal>>,
) {
    let mut payload = first;
    loop {
        if let Some(terminal) = handle_payload(payload, &mut stdout, &mut stderr).await {
            let _ = exit.send(Some(terminal));
            return;
        }
        payload = match codec::read_frame(&mut reader).await {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "process stream ended without exit status");
                let _ = exit.send(Some(Terminal::Failed(SessionError::Disconnected)));
                return;
            }
        };
    }
}

async fn handle_payload(
    payload: ProcessPayload,
    stdout: &mut Option<OutputSink>,
    stderr: &mut Option<OutputSink>,
) -> Option<Terminal> {
    if let (Some(source), Some(data)) = (payload.source, &payload.data) {
        let sink = match source {
            StreamSource::Stdout => stdout.as_mut(),
            StreamSource::Stderr => stderr.as_mut(),
            StreamSource::Stdin => None,
        };
        if let Some(sink) = sink {
            // The server's stream is authoritative; a failing sink must not
            // take the session down.
            let written = async {
                sink.write_all(data.as_bytes()).await?;
                sink.flush().await
            };
            if let Err(err) = written.await {
                tracing::warn!(error = %err, "dropping output chunk after sink failure");
            }
        }
    }

    if let Some(message) = payload.error {
        return Some(Terminal::Failed(SessionError::Remote(message)));
    }
    if let Some(status) = payload.exit_status {
        return Some(Terminal::Exited(status));
    }
    None
}

/// Upstream stdin pump task.
///
/// Stdin rides the wire as JSON text, so the source must produce valid
/// UTF-8; a read may end inside a multi-byte sequence, and the tail is held
/// back until the rest arrives. A clean end of input is announced with an
/// empty stdin frame. A failing or undecodable source sends nothing: the
/// server must observe the absence rather than receive a false end-of-input
/// marker.
async fn pump_stdin(id: u32, mut stdin: StdinSource, writer: PayloadWriter) {
    let mut buf = vec![0u8; STDIN_CHUNK_SIZE];
    let mut pending = Vec::new();
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => {
                if !pending.is_empty() {
                    tracing::warn!(
                        process_id = id,
                        "stdin ended inside a multi-byte sequence; leaving process input open"
                    );
                    return;
                }
                let _ = writer.send(&stdin_frame(id, String::new())).await;
                return;
            }
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let (data, invalid) = split_utf8_prefix(&mut pending);
                if !data.is_empty() && writer.send(&stdin_frame(id, data)).await.is_err() {
                    return;
                }
                if invalid {
                    tracing::warn!(
                        process_id = id,
                        "stdin is not valid UTF-8; leaving process input open"
                    );
                    return;
                }
            }
            Err(err) => {
                tracing::debug!(process_id = id, error = %err, "stdin source failed; leaving process input open");
                return;
            }
        }
    }
}

/// Splits the longest valid UTF-8 prefix out of `pending`.
///
/// An unfinished multi-byte sequence at the end stays behind for the next
/// read; the flag reports bytes that can never decode.
fn split_utf8_prefix(pending: &mut Vec<u8>) -> (String, bool) {
    let (valid_up_to, invalid) = match std::str::from_utf8(pending) {
        Ok(_) => (pending.len(), false),
        Err(err) => (err.valid_up_to(), err.error_len().is_some()),
    };
    let rest = pending.split_off(valid_up_to);
    let data = String::from_utf8(std::mem::replace(pending, rest)).unwrap_or_default();
    (data, invalid)
}

fn stdin_frame(id: u32, data: String) -> ProcessPayload {
    ProcessPayload {
        process_id: id,
        source: Some(StreamSource::Stdin),
        data: Some(data),
        ..Default::default()
    }
}
