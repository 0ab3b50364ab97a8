//! Conversion request/response messages.
//!
//! Wire layout (each field one frame, fixed order, no version byte):
//! - request:  `format|""`, `input`, `output`, `options|""`
//! - response: decimal text of the exit code

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::PathBuf;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::ipc::codec::{encode_frame, read_frame, read_int, write_int};
use crate::types::{ConversionRequest, ConversionResult, Error, Result};

/// Serialize a request into its four concatenated frames.
pub fn encode_request(request: &ConversionRequest) -> Result<BytesMut> {
    let mut buf = BytesMut::new();
    encode_frame(request.format.as_deref().unwrap_or("").as_bytes(), &mut buf)?;
    encode_frame(request.input.as_os_str().as_bytes(), &mut buf)?;
    encode_frame(request.output.as_os_str().as_bytes(), &mut buf)?;
    encode_frame(request.options.as_deref().unwrap_or("").as_bytes(), &mut buf)?;
    Ok(buf)
}

/// Send a request.
pub async fn write_request<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    request: &ConversionRequest,
) -> Result<()> {
    let buf = encode_request(request)?;
    writer.write_all(&buf).await?;
    writer.flush().await?;
    Ok(())
}

/// Receive a request. Empty format/options decode as `None`.
pub async fn read_request<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<ConversionRequest> {
    let format = read_frame(reader, max_frame_bytes).await?;
    let input = read_frame(reader, max_frame_bytes).await?;
    let output = read_frame(reader, max_frame_bytes).await?;
    let options = read_frame(reader, max_frame_bytes).await?;

    if input.is_empty() || output.is_empty() {
        return Err(Error::protocol("empty input or output path"));
    }

    Ok(ConversionRequest {
        format: optional_text(format, "format")?,
        input: PathBuf::from(OsString::from_vec(input)),
        output: PathBuf::from(OsString::from_vec(output)),
        options: optional_text(options, "options")?,
    })
}

/// Send a result.
pub async fn write_result<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    result: ConversionResult,
) -> Result<()> {
    write_int(writer, result.exit_code).await?;
    Ok(())
}

/// Receive a result.
pub async fn read_result<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    max_frame_bytes: u32,
) -> Result<ConversionResult> {
    let code = read_int(reader, max_frame_bytes).await?;
    Ok(ConversionResult::new(code))
}

fn optional_text(bytes: Vec<u8>, field: &str) -> Result<Option<String>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|_| Error::protocol(format!("{} is not valid UTF-8", field)))
}
