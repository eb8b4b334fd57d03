//! Hijacked full-duplex streams for process endpoints.
//!
//! The process endpoints upgrade an ordinary request/response exchange into a
//! raw bidirectional message stream: the server writes its status line and
//! headers, and from then on both sides write payloads straight onto the
//! socket. The request head is therefore written by hand and the connection
//! handed over untouched once the response head has been parsed — no
//! keep-alive or header machinery survives past that point. Bytes the header
//! parser over-read stay in the returned reader's buffer.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::endpoint::{BoxedStream, Endpoint};
use crate::error::{ClientError, Result};

/// A transport taken over from the request/response layer.
pub(crate) struct HijackedStream {
    /// Downstream half, with any over-read bytes still buffered.
    pub reader: BufReader<ReadHalf<BoxedStream>>,
    /// Upstream half.
    pub writer: WriteHalf<BoxedStream>,
}

struct ResponseHead {
    status: u16,
    content_length: Option<usize>,
}

/// Issues a request and hijacks the connection behind it.
///
/// Fails synchronously with [`ClientError::Http`] when the server rejects the
/// request, reading the error body before giving the connection up.
pub(crate) async fn request(
    endpoint: &Endpoint,
    method: &str,
    path_and_query: &str,
    body: Option<&[u8]>,
) -> Result<HijackedStream> {
    let stream = endpoint.connect().await?;
    let (read_half, mut writer) = tokio::io::split(stream);

    let mut head = format!("{method} {path_and_query} HTTP/1.1\r\nHost: localhost\r\n");
    if let Some(body) = body {
        head.push_str("Content-Type: application/json\r\n");
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");

    writer.write_all(head.as_bytes()).await?;
    if let Some(body) = body {
        writer.write_all(body).await?;
    }
    writer.flush().await?;

    let mut reader = BufReader::new(read_half);
    let head = read_response_head(&mut reader).await?;
    if !(200..300).contains(&head.status) {
        let body = read_error_body(&mut reader, head.content_length).await;
        return Err(ClientError::Http {
            status: head.status,
            body,
        });
    }

    tracing::debug!(method, path = path_and_query, "hijacked process stream");
    Ok(HijackedStream { reader, writer })
}

async fn read_response_head(
    reader: &mut BufReader<ReadHalf<BoxedStream>>,
) -> Result<ResponseHead> {
    let status_line = read_header_line(reader).await?;
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| malformed(format!("malformed status line: {status_line:?}")))?;

    let mut content_length = None;
    loop {
        let line = read_header_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(malformed(format!("malformed header line: {line:?}")));
        };
        if name.eq_ignore_ascii_case("content-length") {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("malformed content length: {value:?}")))?,
            );
        }
    }

    Ok(ResponseHead {
        status,
        content_length,
    })
}

async fn read_header_line(reader: &mut BufReader<ReadHalf<BoxedStream>>) -> Result<String> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ClientError::Io(io::ErrorKind::UnexpectedEof.into()));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

async fn read_error_body(
    reader: &mut BufReader<ReadHalf<BoxedStream>>,
    content_length: Option<usize>,
) -> String {
    let mut body = Vec::new();
    let outcome = match content_length {
        Some(len) => {
            body.resize(len, 0);
            reader.read_exact(&mut body).await.map(|_| ())
        }
        None => reader.read_to_end(&mut body).await.map(|_| ()),
    };
    if let Err(err) = outcome {
        tracing::debug!(error = %err, "short read on rejected stream request");
    }
    String::from_utf8_lossy(&body).into_owned()
}

fn malformed(message: String) -> ClientError {
    ClientError::Io(io::Error::new(io::ErrorKind::InvalidData, message))
}
