//! The two body encodings of the protocol.
//!
//! Requests are textual: one self-describing JSON object per message, written
//! directly into the request body. Framed streams (response bodies of the
//! small-response endpoints and server-side process payloads) are binary: a
//! LEB128 varint payload length followed by the JSON payload. The framing is
//! symmetric so tests build fixtures with the same functions the client uses
//! to read them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

/// Maximum allowed frame payload (16 MiB).
pub const MAX_FRAME: u64 = 16 * 1024 * 1024;

/// Encodes a message in its textual request form.
pub fn encode_request<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(msg)?)
}

/// Encodes one length-delimited frame into a byte vector.
pub fn encode_frame<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(msg)?;
    let mut frame = Vec::with_capacity(payload.len() + 2);
    put_varint(&mut frame, payload.len() as u64);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writes one length-delimited frame to `w`.
pub async fn write_frame<W, T>(w: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let frame = encode_frame(msg)?;
    w.write_all(&frame).await?;
    w.flush().await?;
    Ok(())
}

/// Reads one length-delimited frame from `r` and decodes it as `T`.
///
/// A stream that ends inside a frame surfaces as [`ProtocolError::Io`] with
/// `UnexpectedEof`; a payload that does not match `T` as
/// [`ProtocolError::Frame`].
pub async fn read_frame<R, T>(r: &mut R) -> Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let len = read_varint(r).await?;
    if len > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Decodes one frame from a fully-buffered body.
pub fn decode_frame<T: DeserializeOwned>(buf: &[u8]) -> Result<T> {
    let (len, prefix) = get_varint(buf)?;
    if len > MAX_FRAME {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let end = prefix + len as usize;
    if end > buf.len() {
        return Err(ProtocolError::Truncated);
    }
    Ok(serde_json::from_slice(&buf[prefix..end])?)
}

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

async fn read_varint<R: AsyncRead + Unpin>(r: &mut R) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = r.read_u8().await?;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift >= 64 {
            return Err(ProtocolError::InvalidLength);
        }
    }
}

fn get_varint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;
    let mut shift = 0u32;
    for (used, &byte) in buf.iter().enumerate() {
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, used + 1));
        }
        shift += 7;
        if shift >= 64 {
            return Err(ProtocolError::InvalidLength);
        }
    }
    Err(ProtocolError::Truncated)
}
