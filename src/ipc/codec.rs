//! Frame codec for the conversion wire protocol.
//!
//! Every field travels as one frame: a length header followed by the raw
//! payload bytes. Short lengths use a single byte; longer ones use a marker
//! byte followed by a big-endian length:
//! ```text
//! len < 253         ┌─────────┬───────────────┐
//!                   │ len(1B) │ payload       │
//!                   └─────────┴───────────────┘
//! len < 2^16        ┌─────┬─────────┬─────────┐
//!                   │ 253 │ len(2B) │ payload │
//! len < 2^24        │ 254 │ len(3B) │ payload │
//! len < 2^32        │ 255 │ len(4B) │ payload │
//!                   └─────┴─────────┴─────────┘
//! ```
//! Frames are concatenated with no separators.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Largest length that fits the single-byte header.
pub const MAX_SHORT_LEN: usize = 252;

const MARKER_U16: u8 = 253;
const MARKER_U24: u8 = 254;
const MARKER_U32: u8 = 255;

/// Framing failures.
#[derive(Error, Debug)]
pub enum FrameError {
    /// The stream ended before the declared bytes arrived.
    #[error("truncated frame: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    /// Declared or requested length exceeds what is allowed.
    #[error("frame too large: {len} bytes (limit {limit})")]
    TooLarge { len: u64, limit: u64 },

    /// An integer frame did not hold decimal text.
    #[error("invalid integer frame: {0:?}")]
    InvalidInteger(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append the length header for a payload of `len` bytes.
pub fn encode_len(len: usize, dst: &mut BytesMut) -> Result<(), FrameError> {
    if len <= MAX_SHORT_LEN {
        dst.put_u8(len as u8);
    } else if len < 0x1_0000 {
        dst.put_u8(MARKER_U16);
        dst.put_u16(len as u16);
    } else if len < 0x100_0000 {
        dst.put_u8(MARKER_U24);
        dst.put_uint(len as u64, 3);
    } else if let Ok(len) = u32::try_from(len) {
        dst.put_u8(MARKER_U32);
        dst.put_u32(len);
    } else {
        return Err(FrameError::TooLarge {
            len: len as u64,
            limit: u64::from(u32::MAX),
        });
    }
    Ok(())
}

/// Append one complete frame (header + payload).
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<(), FrameError> {
    dst.reserve(payload.len() + 5);
    encode_len(payload.len(), dst)?;
    dst.put_slice(payload);
    Ok(())
}

/// Read a frame length header.
pub async fn read_len<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<usize, FrameError> {
    let mut marker = [0u8; 1];
    read_exact(reader, &mut marker).await?;

    let extra = match marker[0] {
        len if len < MARKER_U16 => return Ok(usize::from(len)),
        m => usize::from(m - 251),
    };

    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf[..extra]).await?;
    let len = buf[..extra]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
    Ok(len)
}

/// Read one frame from the stream.
///
/// `max_frame_bytes` caps the accepted payload size; larger declared lengths
/// are rejected before any allocation. End-of-stream at any point, including
/// before the header, is an error.
pub async fn read_frame<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<Vec<u8>, FrameError> {
    let len = read_len(reader).await?;
    if len as u64 > u64::from(max_frame_bytes) {
        return Err(FrameError::TooLarge {
            len: len as u64,
            limit: u64::from(max_frame_bytes),
        });
    }

    let mut payload = vec![0u8; len];
    read_exact(reader, &mut payload).await?;
    Ok(payload)
}

/// Write one frame to the stream.
pub async fn write_frame<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), FrameError> {
    let mut buf = BytesMut::new();
    encode_frame(payload, &mut buf)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Write an integer as its decimal text inside one frame.
pub async fn write_int<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    value: i32,
) -> Result<(), FrameError> {
    write_frame(writer, value.to_string().as_bytes()).await
}

/// Read an integer carried as decimal text inside one frame.
pub async fn read_int<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<i32, FrameError> {
    let payload = read_frame(reader, max_frame_bytes).await?;
    let text = String::from_utf8_lossy(&payload);
    text.trim()
        .parse::<i32>()
        .map_err(|_| FrameError::InvalidInteger(text.into_owned()))
}

/// Fill `buf` completely. Hand-rolled instead of `AsyncReadExt::read_exact`
/// so a truncation error can carry the byte count received.
async fn read_exact<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<(), FrameError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                expected: buf.len(),
                received: filled,
            });
        }
        filled += n;
    }
    Ok(())
}
