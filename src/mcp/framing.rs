//! `Content-Length` message framing over byte streams
//!
//! Each message is a header block terminated by an empty line, followed by
//! exactly `Content-Length` bytes of JSON.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frames larger than this are rejected instead of buffered
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum FramingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid Content-Length header: {0}")]
    InvalidLength(String),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_BYTES} byte limit")]
    TooLarge(usize),
}

/// Read one framed message body
///
/// Returns `Ok(None)` at end of input. Header blocks without a usable
/// length are skipped.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut content_length: Option<usize> = None;
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let header = line.trim();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':')
                && name.trim().eq_ignore_ascii_case("content-length")
            {
                let value = value.trim();
                let parsed = value
                    .parse::<usize>()
                    .map_err(|_| FramingError::InvalidLength(value.to_string()))?;
                content_length = Some(parsed);
            }
        }

        let length = match content_length {
            Some(0) | None => continue,
            Some(length) if length > MAX_FRAME_BYTES => return Err(FramingError::TooLarge(length)),
            Some(length) => length,
        };

        let mut body = vec![0u8; length];
        match reader.read_exact(&mut body).await {
            Ok(_) => return Ok(Some(body)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Write one framed message and flush
pub async fn write_message<W>(writer: &mut W, body: &[u8]) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}
